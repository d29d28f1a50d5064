// src/algorithms/tests/mod.rs
