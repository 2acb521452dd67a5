pub mod engine;
pub mod events;
pub mod layout;
pub mod overrides;
pub mod status;
pub mod templates;

pub mod service;

pub use engine::{PrintJob, PrintOutcome, PrinterConfig, PrinterEngine};
pub use events::PrinterEvent;
pub use layout::{compose_line, compose_lines, escape_control_chars};
pub use overrides::{OverrideRule, OverrideSet, TemplateSwap, TextSubstitution};
pub use status::{PrinterFault, PrinterState, PrinterStatus};
pub use templates::{RegionDef, RegionId, TemplateCache, TemplateDef, TemplateId};

pub use service::{PrinterHandle, PrinterRequest, run_service, service_channel};
