//! Host callback interface.

use crate::rewrite::CompiledWorklet;

/// Receives every compiled worklet of a file, innermost first, once the whole file compiled.
pub trait CompilerHost {
    fn register_compiled_unit(&mut self, unit: &CompiledWorklet);
}

impl CompilerHost for Vec<CompiledWorklet> {
    fn register_compiled_unit(&mut self, unit: &CompiledWorklet) {
        self.push(unit.clone());
    }
}

