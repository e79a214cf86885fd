//! Training artifacts and the scorer built from them

pub mod classifier;
pub mod encoder;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod scaler;

pub use classifier::{Classifier, ClassifierManifest, LogisticClassifier};
pub use encoder::OneHotEncoder;
pub use inference::Scorer;
pub use loader::ModelLoader;
pub use scaler::StandardScaler;
