pub mod stop_signal;
pub mod usecase;
