mod client;
mod provider;

pub use provider::JenkinsProvider;
