pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
mod redirect;
mod scene;
mod sim_host;
