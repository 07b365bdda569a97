//! Conversion between generic documents and validated rule nodes.
//!
//! Rule files arrive as untyped documents (JSON, or anything serde can turn
//! into a [`serde_json::Value`]). Every node type implements [`Decode`], which
//! reads the `type` discriminator first, dispatches to the kind's own strict
//! decoder and rejects unknown kinds before looking at any other field.
//! [`Encode`] produces the canonical document form; decoding an encoded node
//! yields an equal node.

mod error;
mod fields;

use serde_json::Value;

pub use error::{DecodeError, UnknownKeyword};

pub(crate) use fields::{decode_list, json_kind, Fields, ObjectBuilder};

/// Structural decoding from a document value.
pub trait Decode: Sized {
    /// Decode and validate a node.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the document is malformed, names an unknown
    /// kind, lacks a required field, or uses an unresolvable shorthand.
    fn decode(doc: &Value) -> Result<Self, DecodeError>;
}

/// Canonical document form of a node.
pub trait Encode {
    fn encode(&self) -> Value;
}

impl<T: Encode> Encode for Box<T> {
    fn encode(&self) -> Value {
        (**self).encode()
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        T::decode(doc).map(Box::new)
    }
}
