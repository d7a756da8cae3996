//! Library surface for the DDARP composite node, split out from the
//! binary so integration tests can drive [`composite::CompositeNode`]
//! directly.

pub mod composite;
pub mod driver;
pub mod health;
