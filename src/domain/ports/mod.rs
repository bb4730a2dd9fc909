//! Ports: traits the engines depend on, implemented by adapters.

pub mod lesson_generator;
pub mod motif_repository;
pub mod prediction_repository;
pub mod price_feed;
pub mod strand_repository;

pub use lesson_generator::{LessonGenerator, StaticLessonGenerator};
pub use motif_repository::MotifRepository;
pub use prediction_repository::PredictionRepository;
pub use price_feed::PriceFeed;
pub use strand_repository::{StrandFilters, StrandRepository};
