//! NLU Training
//!
//! Primitives for turning a backend training request into a persisted model:
//! - Assembling the corpus (`build_corpus`, `ExampleSource`)
//! - Writing/reading the canonical corpus document (`CorpusWriter`)
//! - Capturing a job's log transcript (`LogCapture`)
//! - Trainer and persistor collaborators, with local implementations

pub mod artifacts;
pub mod builder;
pub mod capture;
pub mod corpus;
pub mod error;
pub mod export;
pub mod interpret;
pub mod layout;
pub mod persistor;
pub mod registry;
pub mod trainer;
pub mod writer;

pub use artifacts::{ArtifactKind, ModelArtifact, ModelManifest};
pub use builder::{build_corpus, BackendExampleSource, CorpusBuildError, ExampleFetchError, ExampleSource, FetchPhase, FetchedExample};
pub use capture::{CaptureScope, LogCapture, TrainingLog, TranscriptLayer};
pub use corpus::{EntitySynonyms, Message, TrainingCorpus};
pub use error::{TrainingError, TrainingResult};
pub use export::{ExportTrainer, ExportTrainerFactory};
pub use interpret::{CorpusEvaluator, EvaluationReport, Evaluator, IntentMatch, Interpreter, LookupIndex, LookupInterpreter, Misclassification, ParseResult};
pub use layout::StoreLayout;
pub use persistor::{FsPersistor, FsPersistorFactory};
pub use registry::{ModelStore, StoredModel};
pub use trainer::{PersistedModel, Persistor, PersistorFactory, Trainer, TrainerConfig, TrainerFactory};
pub use writer::{CorpusWriter, SerializedDocument};
