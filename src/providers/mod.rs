mod jenkins;
mod zuul;

pub use jenkins::JenkinsProvider;
pub use zuul::ZuulProvider;
