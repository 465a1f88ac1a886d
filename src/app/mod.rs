pub mod classify_use_case;

pub use classify_use_case::ClassifyUseCase;
