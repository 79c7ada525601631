#![doc = include_str!("../README.md")]

mod ast;
mod builder;
mod compiler;
mod config;
mod error;
mod heap;
mod host;
mod keywords;
mod matrix;
mod natives;
mod opcode;
mod parser;
mod prng;
mod program;
mod render;
mod trait_genotype;
mod unparser;
mod value;
mod vm;
mod word_table;

pub use crate::{
    ast::{Node, NodeKind},
    compiler::gene::GeneValue,
    config::VmLimits,
    error::{Phase, SeniError, SeniResult},
    host::Host,
    program::Program,
    render::{RenderBuffer, RenderPacket},
    trait_genotype::{Genotype, Trait, TraitList},
    value::{ColourFormat, Value},
    vm::Vm,
    word_table::Iname,
};
