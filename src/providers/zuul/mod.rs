mod api;
mod provider;
mod requests;
mod rest;
#[cfg(test)]
mod testing;
mod vars;

pub use provider::ZuulProvider;
