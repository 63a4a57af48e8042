// dynlisp Symbol Table and Package System
//
// Symbols are interned per package and compared by id. The table is shared
// between interpreters (`Send + Sync`); each package serializes interning
// through its own lock. Global values live in the interpreter, not here.

use crate::error::BindingError;
use crate::fastmap::HashMap;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Unique identifier for a symbol (index into symbol table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Unique identifier for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageId(pub u32);

impl PackageId {
    pub const KEYWORD: PackageId = PackageId(0);
    pub const SYSTEM: PackageId = PackageId(1);
    pub const USER: PackageId = PackageId(2);
}

/// Prefix that marks a symbol as a dynamic ("special") variable.
pub const DYNAMIC_PREFIX: char = '*';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Plain,
    /// Immutable once defined
    Constant,
    /// Self-evaluating, immutable
    Keyword,
}

/// Symbol metadata
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Arc<str>,
    /// Home package (None for uninterned symbols)
    pub package: Option<PackageId>,
    pub kind: SymbolKind,
    /// Resolved through the dynamic binding stack instead of lexical scope
    pub dynamic: bool,
}

impl Symbol {
    fn new(name: Arc<str>, package: Option<PackageId>) -> Self {
        let kind = if package == Some(PackageId::KEYWORD) {
            SymbolKind::Keyword
        } else {
            SymbolKind::Plain
        };
        let dynamic = kind == SymbolKind::Plain && is_dynamic_name(&name);
        Self {
            name,
            package,
            kind,
            dynamic,
        }
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == SymbolKind::Keyword
    }

    pub fn is_constant(&self) -> bool {
        self.kind == SymbolKind::Constant
    }
}

/// `*depth*` is dynamic, `*` and `**` are not.
pub fn is_dynamic_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some(DYNAMIC_PREFIX) && matches!(chars.next(), Some(c) if c != DYNAMIC_PREFIX)
}

#[derive(Debug, Default)]
struct PackageTables {
    internal: HashMap<Arc<str>, SymbolId>,
    external: HashMap<Arc<str>, SymbolId>,
    use_list: Vec<PackageId>,
}

/// A namespace of interned symbols
#[derive(Debug)]
pub struct Package {
    pub name: String,
    tables: Mutex<PackageTables>,
}

impl Package {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: Mutex::new(PackageTables::default()),
        }
    }

    /// Find an external symbol
    pub fn find_external(&self, name: &str) -> Option<SymbolId> {
        self.tables.lock().external.get(name).copied()
    }

    /// Find a symbol present in this package (internal or external)
    pub fn find_present(&self, name: &str) -> Option<SymbolId> {
        let tables = self.tables.lock();
        tables
            .internal
            .get(name)
            .or_else(|| tables.external.get(name))
            .copied()
    }

    pub fn use_list(&self) -> Vec<PackageId> {
        self.tables.lock().use_list.clone()
    }

    pub fn external_symbols(&self) -> Vec<SymbolId> {
        self.tables.lock().external.values().copied().collect()
    }
}

/// The global symbol table
#[derive(Debug)]
pub struct SymbolTable {
    /// All symbols indexed by SymbolId
    symbols: RwLock<Vec<Symbol>>,
    /// All packages indexed by PackageId
    packages: RwLock<Vec<Arc<Package>>>,
    /// Package name -> PackageId lookup
    package_names: DashMap<String, PackageId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let table = Self {
            symbols: RwLock::new(Vec::new()),
            packages: RwLock::new(Vec::new()),
            package_names: DashMap::new(),
        };

        table.create_package("keyword"); // PackageId(0)
        table.create_package("system"); // PackageId(1)
        table.create_package("user"); // PackageId(2)
        table.use_package(PackageId::USER, PackageId::SYSTEM);

        table
    }

    /// Create a new package, or return the existing one with that name
    pub fn create_package(&self, name: &str) -> PackageId {
        if let Some(id) = self.find_package(name) {
            return id;
        }
        let mut packages = self.packages.write();
        let id = PackageId(packages.len() as u32);
        packages.push(Arc::new(Package::new(name)));
        self.package_names.insert(name.to_string(), id);
        id
    }

    /// Find a package by name
    pub fn find_package(&self, name: &str) -> Option<PackageId> {
        self.package_names.get(name).map(|entry| *entry.value())
    }

    pub fn package(&self, id: PackageId) -> Option<Arc<Package>> {
        self.packages.read().get(id.0 as usize).cloned()
    }

    pub fn package_name(&self, id: PackageId) -> Option<String> {
        self.package(id).map(|p| p.name.clone())
    }

    /// Add `used` to the use-list of `pkg`. Use-lists are expected to be acyclic.
    pub fn use_package(&self, pkg: PackageId, used: PackageId) {
        if pkg == used {
            return;
        }
        if let Some(package) = self.package(pkg) {
            let mut tables = package.tables.lock();
            if !tables.use_list.contains(&used) {
                tables.use_list.push(used);
            }
        }
    }

    /// Get a copy of the symbol metadata
    pub fn get_symbol(&self, id: SymbolId) -> Option<Symbol> {
        self.symbols.read().get(id.0 as usize).cloned()
    }

    pub fn symbol_name(&self, id: SymbolId) -> Arc<str> {
        self.symbols
            .read()
            .get(id.0 as usize)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| Arc::from("#<invalid-symbol>"))
    }

    pub fn symbol_package(&self, id: SymbolId) -> Option<PackageId> {
        self.symbols.read().get(id.0 as usize).and_then(|s| s.package)
    }

    pub fn kind(&self, id: SymbolId) -> SymbolKind {
        self.symbols
            .read()
            .get(id.0 as usize)
            .map(|s| s.kind)
            .unwrap_or(SymbolKind::Plain)
    }

    pub fn is_dynamic(&self, id: SymbolId) -> bool {
        self.symbols
            .read()
            .get(id.0 as usize)
            .map(|s| s.dynamic)
            .unwrap_or(false)
    }

    pub fn is_keyword(&self, id: SymbolId) -> bool {
        self.kind(id) == SymbolKind::Keyword
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.read().len()
    }

    /// Search `pkg`: own internal, own external, then each used package's
    /// external table depth-first. First match wins.
    pub fn find_symbol_in(&self, name: &str, pkg: PackageId) -> Option<SymbolId> {
        let package = self.package(pkg)?;
        if let Some(sym) = package.find_present(name) {
            return Some(sym);
        }
        let mut visited = vec![pkg];
        self.find_inherited(name, &package.use_list(), &mut visited)
    }

    fn find_inherited(
        &self,
        name: &str,
        use_list: &[PackageId],
        visited: &mut Vec<PackageId>,
    ) -> Option<SymbolId> {
        for &used in use_list {
            if visited.contains(&used) {
                continue;
            }
            visited.push(used);
            let Some(package) = self.package(used) else {
                continue;
            };
            if let Some(sym) = package.find_external(name) {
                return Some(sym);
            }
            if let Some(sym) = self.find_inherited(name, &package.use_list(), visited) {
                return Some(sym);
            }
        }
        None
    }

    /// Intern `name` relative to `current`. A `pkg@name` designator bypasses
    /// the search and interns directly into the named package.
    pub fn intern(&self, name: &str, current: PackageId) -> Result<SymbolId, String> {
        if let Some((pkg_name, sym_name)) = split_qualified(name) {
            let pkg = self
                .find_package(pkg_name)
                .ok_or_else(|| pkg_name.to_string())?;
            return Ok(self.intern_in(sym_name, pkg));
        }
        Ok(self.intern_in(name, current))
    }

    /// Intern a symbol in a specific package
    pub fn intern_in(&self, name: &str, pkg_id: PackageId) -> SymbolId {
        let Some(package) = self.package(pkg_id) else {
            return self.make_symbol(name);
        };

        // Hold the package lock across lookup and insertion so two threads
        // cannot create the same symbol twice.
        let mut tables = package.tables.lock();
        if let Some(sym) = tables
            .internal
            .get(name)
            .or_else(|| tables.external.get(name))
        {
            return *sym;
        }
        let use_list = tables.use_list.clone();
        let mut visited = vec![pkg_id];
        if let Some(sym) = self.find_inherited(name, &use_list, &mut visited) {
            return sym;
        }

        let name: Arc<str> = Arc::from(name);
        let sym_id = {
            let mut symbols = self.symbols.write();
            let id = SymbolId(symbols.len() as u32);
            symbols.push(Symbol::new(name.clone(), Some(pkg_id)));
            id
        };

        // Keywords are automatically external
        if pkg_id == PackageId::KEYWORD {
            tables.external.insert(name, sym_id);
        } else {
            tables.internal.insert(name, sym_id);
        }
        sym_id
    }

    /// Intern a keyword (in the keyword package)
    pub fn intern_keyword(&self, name: &str) -> SymbolId {
        self.intern_in(name, PackageId::KEYWORD)
    }

    /// Create an uninterned symbol
    pub fn make_symbol(&self, name: &str) -> SymbolId {
        let mut symbols = self.symbols.write();
        let id = SymbolId(symbols.len() as u32);
        symbols.push(Symbol::new(Arc::from(name), None));
        id
    }

    /// Move a symbol from its home package's internal table to the external one
    pub fn export_symbol(&self, id: SymbolId) {
        let Some(sym) = self.get_symbol(id) else {
            return;
        };
        let Some(package) = sym.package.and_then(|p| self.package(p)) else {
            return;
        };
        let mut tables = package.tables.lock();
        tables.internal.remove(&sym.name);
        tables.external.insert(sym.name, id);
    }

    /// Intern each name in `pkg` and export it
    pub fn export(&self, pkg: PackageId, names: &[&str]) -> Vec<SymbolId> {
        names
            .iter()
            .map(|name| {
                let id = self.intern_in(name, pkg);
                if self.symbol_package(id) == Some(pkg) {
                    self.export_symbol(id);
                }
                id
            })
            .collect()
    }

    /// Turn a symbol into a constant. Redefining a constant is an error.
    pub fn make_constant(&self, id: SymbolId) -> Result<(), BindingError> {
        let mut symbols = self.symbols.write();
        let Some(sym) = symbols.get_mut(id.0 as usize) else {
            return Ok(());
        };
        match sym.kind {
            SymbolKind::Constant => Err(BindingError::DuplicateConstant(sym.name.to_string())),
            SymbolKind::Keyword => Err(BindingError::KeywordAssignment(sym.name.to_string())),
            SymbolKind::Plain => {
                sym.kind = SymbolKind::Constant;
                sym.dynamic = false;
                Ok(())
            }
        }
    }

    /// Check that a global value may be stored in `id`
    pub fn check_assignable(&self, id: SymbolId) -> Result<(), BindingError> {
        let symbols = self.symbols.read();
        match symbols.get(id.0 as usize) {
            Some(sym) if sym.kind == SymbolKind::Constant => {
                Err(BindingError::ConstantAssignment(sym.name.to_string()))
            }
            Some(sym) if sym.kind == SymbolKind::Keyword => {
                Err(BindingError::KeywordAssignment(sym.name.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `pkg@name`. A leading or trailing `@` does not qualify.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    let at = name.find('@')?;
    if at == 0 || at + 1 == name.len() {
        return None;
    }
    Some((&name[..at], &name[at + 1..]))
}
