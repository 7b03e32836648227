use enzymes::Enzymes;
use lazy_static::lazy_static;

pub mod assembly;
pub mod common_features;
pub mod cut_site;
pub mod dna_sequence;
pub mod engine;
pub mod enzymes;
pub mod error;
pub mod fragment;
pub mod iupac_code;
pub mod ligation;
pub mod parameters;
pub mod position;
pub mod restriction_enzyme;
pub mod vector;

lazy_static! {
    // Restriction enzymes
    pub static ref ENZYMES: Enzymes = Enzymes::default();
}
