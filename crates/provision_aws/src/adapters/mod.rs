pub mod endpoint;
pub mod functions;
pub mod registry;
pub mod secrets;

/// Drives an SDK future to completion from synchronous adapter code.
/// Requires the multi-threaded tokio runtime the `deploy` binary runs on.
pub(crate) fn run_blocking<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
