//! sm-core: Core library for merging modded content into game data containers
//!
//! This library provides functionality to:
//! - Merge text fragments and manual entries into text banks
//! - Merge animation banks, or strip them down to partial banks in diff mode
//! - Merge atlas layouts and raw texture packs
//! - Diff param revisions into a re-playable edit script
//! - Convert CSV row edits into edit scripts, apply them directly, or export params as CSV
//! - Apply edit scripts
//! - Write merged files back with a `.prev` backup

pub mod anim;
pub mod codec;
pub mod config;
pub mod container;
pub mod csv_edit;
pub mod diff;
pub mod error;
pub mod history;
pub mod inputs;
pub mod layout;
pub mod merge;
pub mod param;
pub mod persist;
pub mod script;
pub mod text;
pub mod texture;

pub use anim::{
    merge_animations, AnimationBank, AnimationMerge, Clip, IncomingAnimation, PartialBank,
};
pub use config::RunConfig;
pub use container::{successor_slot, Body, Container, ResourceKind, SubResource};
pub use csv_edit::{apply_csv_file, apply_csv_rows, csv_to_script, export_csv, CsvApply};
pub use diff::{diff_banks, diff_rows, RowDiff};
pub use error::{Error, Result};
pub use history::{HistoryEntry, HistoryFile};
pub use inputs::{collect_inputs, InputSet};
pub use layout::{merge_layouts, Atlas, IncomingLayout, SubTexture};
pub use merge::{Change, ChangeKind, ChangeLog, ConflictPolicy, MergeOptions, MergeOutcome};
pub use param::{FieldDef, FieldType, FieldValue, Param, ParamBank, Row};
pub use persist::persist;
pub use script::{apply_script, collapse_blank_lines, seed_missing_rows, EditScript, Statement};
pub use text::{
    apply_manual_entries, merge_text_fragments, parse_manual_entries, IncomingText, ManualEntry,
    TextBank, TextEntry,
};
pub use texture::{merge_textures, IncomingTexture, Texture, TexturePack};
