#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_controller_core as core;
pub use gateway_controller_k8s_api as k8s;
pub use gateway_controller_k8s_index as index;
pub use gateway_controller_translator as translator;

mod args;
mod event_loop;
mod metrics;

pub use self::{
    args::Args,
    event_loop::{EventLoop, Translation, TranslationRx},
    metrics::TranslationMetrics,
};
