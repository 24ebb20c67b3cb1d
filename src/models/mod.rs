// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod attribute;
pub mod attribute_list;
pub mod ids;
pub mod record;
pub mod source_id;
pub mod timestamp;

pub use attribute::{Attribute, WireAttribute};
pub use attribute_list::AttributeList;
pub use ids::AttrFormat;
pub use record::Record;
pub use source_id::SourceId;
pub use timestamp::Timestamp;
