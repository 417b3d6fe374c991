pub mod features;
pub mod format;
pub mod ids;
pub mod sample;

pub use features::{FeatureRecord, MFCC_COUNT};
pub use format::AudioFormat;
pub use ids::SampleId;
pub use sample::{sample_file_name, Sample};
