/*!
 * Monitoring
 * Tracing subscriber setup for the sync primitives
 */

pub mod tracer;

pub use tracer::{init_tracing, try_init_tracing, ENV_TRACE_JSON};
