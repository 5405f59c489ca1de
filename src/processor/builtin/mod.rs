//! Built-in processors

mod http_proxy;
mod shell;
mod stdout;

pub use http_proxy::HttpProxyProcessor;
pub use shell::ShellProcessor;
pub use stdout::StdoutProcessor;
