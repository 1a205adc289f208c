pub mod cache;
pub mod synthesizer;

pub use cache::{CacheStats, EntityTypeCache};
pub use synthesizer::{
    EntitySnapshot, FieldDescriptor, ResolutionWarning, SynthesizedType, TypeMeta,
    TypeSynthesizer,
};
