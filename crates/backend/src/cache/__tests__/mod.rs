mod diagnostics;
mod helpers;
mod limiter;
mod orchestrator;
