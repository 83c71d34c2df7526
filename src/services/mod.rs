// LangCheck Core Services

pub mod config_store;
pub mod corpus;
pub mod credentials;
pub mod detection_client;
pub mod evaluation;
pub mod language_service;

pub use config_store::*;
pub use corpus::*;
pub use credentials::*;
pub use detection_client::*;
pub use language_service::*;

pub use evaluation::{
    detect_by_indices,
    draw_indices,
    evaluate_indices,
    evaluate_sample,
    parse_index_list,
    parse_sample_size,
    score_detections,
    EvaluationError,
    InputError,
    ScoringPolicy,
};
