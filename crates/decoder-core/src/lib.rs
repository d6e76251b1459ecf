pub mod graph;
pub mod lattice;
pub mod logmath;
pub mod scorer;
pub mod search;
pub mod settings;

#[cfg(test)]
pub(crate) mod testutil;
