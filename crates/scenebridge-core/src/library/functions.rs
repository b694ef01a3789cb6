//! Resolved export table for one load session.

use std::collections::HashMap;

use super::backend::{LoadedModule, RawSymbol};

/// Mapping from exported-function name to its resolved address.
///
/// Built eagerly right after a successful open, from the fixed export list
/// the manager was constructed with. Immutable for the lifetime of the load
/// session; the next free/load cycle builds a fresh table.
pub struct FunctionTable {
    functions: HashMap<&'static str, RawSymbol>,
}

impl FunctionTable {
    /// Resolve `names` against `module`. A missing export is logged and
    /// omitted rather than failing the load; the gap surfaces later as a
    /// "function not available" outcome if that capability is invoked.
    pub(crate) fn resolve(module: &dyn LoadedModule, names: &[&'static str]) -> Self {
        let mut functions = HashMap::with_capacity(names.len());
        for &name in names {
            match module.symbol(name) {
                Some(symbol) => {
                    functions.insert(name, symbol);
                }
                None => {
                    tracing::warn!(
                        export = name,
                        "native export not found; calls that need it will be unavailable"
                    );
                }
            }
        }
        FunctionTable { functions }
    }

    /// Look up a resolved export as a typed function pointer. `None` for
    /// names that were not resolved (or never requested).
    ///
    /// # Safety
    ///
    /// `F` must match the export's actual C signature and the owning load
    /// session must still be alive.
    pub unsafe fn get<F: Copy>(&self, name: &str) -> Option<F> {
        self.functions.get(name).map(|symbol| symbol.cast())
    }

    /// Whether `name` was resolved.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of resolved exports.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the table resolved nothing.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::c_void;

    use super::*;

    struct StaticModule;

    unsafe extern "C" fn answer() -> u32 {
        42
    }

    impl LoadedModule for StaticModule {
        fn symbol(&self, name: &str) -> Option<RawSymbol> {
            (name == "answer").then(|| RawSymbol::new(answer as *const c_void))
        }
    }

    #[test]
    fn test_resolved_export_is_callable() {
        let table = FunctionTable::resolve(&StaticModule, &["answer"]);
        assert_eq!(table.len(), 1);
        assert!(table.contains("answer"));

        let func: unsafe extern "C" fn() -> u32 = unsafe { table.get("answer") }.unwrap();
        assert_eq!(unsafe { func() }, 42);
    }

    #[test]
    fn test_unknown_name_lookup_returns_none() {
        let table = FunctionTable::resolve(&StaticModule, &["answer"]);
        let missing: Option<unsafe extern "C" fn() -> u32> = unsafe { table.get("no_such_fn") };
        assert!(missing.is_none());
    }
}
