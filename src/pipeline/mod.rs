//! Pipeline stages for document fiscalization.
//!
//! Each submodule implements one step. The PDF-facing stages sit behind
//! traits ([`text::TextReader`], [`fiscalize::Fiscalizer`],
//! [`stamp::Stamper`]) so the worker can run without pdfium or a network.
//!
//! ## Data Flow
//!
//! ```text
//! watcher ──▶ queue ──▶ worker: text ──▶ extract ──▶ fiscalize ──▶ stamp
//! (notify)   (mpsc)            (pdfium)  (heuristics) (HTTP POST)   (pdfium + qrcode)
//! ```
//!
//! 1. [`watcher`]: filter arrival events (create, rename-in) down to `.pdf` paths and enqueue
//! 2. [`queue`]: unbounded FIFO owned by the coordinator
//! 3. [`text`]: full document text; blocking, runs in `spawn_blocking`
//! 4. [`extract`]: classify the document and build the receipt payload
//! 5. [`fiscalize`]: submit the payload, receive the QR URL
//! 6. [`stamp`]: append a QR page and write to the processed directory
//! 7. [`worker`]: the single consumer driving steps 3–6

pub mod extract;
pub mod fiscalize;
pub mod queue;
pub mod stamp;
pub mod text;
pub mod watcher;
pub mod worker;
