//! # Credit Memo
//!
//! Turns financial PDF documents into structured credit memos.
//!
//! Text is extracted page by page from one or more PDFs, concatenated with
//! `--- PAGE n ---` markers, and sent to an OpenAI-compatible chat-completion
//! endpoint (Groq by default). The answer is parsed, normalized and validated
//! against a fixed memo schema: seller and buyer details, line items, tax
//! rates, an executive summary, key metrics and top risks, each metric and
//! risk tagged with a confidence level and its source pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │   PDFs   │──▶│  Batch   │──▶│ ocr_text.json│──▶│ Generator │──▶ Memo
//! │          │   │ Extract  │   │  (hand-off)  │   │  + LLM    │
//! └──────────┘   └──────────┘   └──────────────┘   └───────────┘
//!                      ▲                                 ▲
//!                      └────────── CLI / HTTP ───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! memo extract statement.pdf        # show extracted pages
//! memo batch ./statements           # extract a folder, write summary
//! memo generate --input ocr_text.json
//! memo run ./statements --output memo.json
//! memo serve                        # HTTP API on 0.0.0.0:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`batch`] | Multi-file extraction driver and summary report |
//! | [`progress`] | Batch progress reporting |
//! | [`memo`] | Memo schema, normalization and validation |
//! | [`prompt`] | Prompt templates |
//! | [`llm`] | Chat-completion backend and client |
//! | [`generate`] | Memo generator and retry policy |
//! | [`handoff`] | `ocr_text.json` hand-off file |
//! | [`server`] | HTTP API |

pub mod batch;
pub mod config;
pub mod extract;
pub mod generate;
pub mod handoff;
pub mod llm;
pub mod memo;
pub mod progress;
pub mod prompt;
pub mod server;
