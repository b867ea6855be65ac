//! Pipeline stages for exam generation.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; decoders and the model backend sit behind traits so tests can swap
//! them out.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ compile ──▶ llm ──▶ materialize
//! (path/URL) (pdf/docx/  (prompt)   (one    (render lines,
//!             encode)               call)    export paragraphs)
//! ```
//!
//! 1. [`input`]: resolve a path or URL to an in-memory artifact, size
//!    checked before the body is read
//! 2. [`extract`]: classify the artifact and decode it to text or a base64
//!    image, via [`pdf`], [`docx`] and [`encode`]; blocking, so callers run it
//!    in `spawn_blocking`
//! 3. [`compile`]: fill the fixed instruction template and pick the model
//! 4. [`llm`]: one backend call with a timeout and single-flight guard;
//!    the only stage with network I/O besides URL download
//! 5. [`materialize`]: split generated text into prose/formula spans and
//!    export paragraphs

pub mod compile;
pub mod docx;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod materialize;
pub mod pdf;
