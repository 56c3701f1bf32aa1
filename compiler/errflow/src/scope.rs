//! What one unit can see: its own declarations plus imported facts.
//!
//! Every foreign entity a unit mentions is resolved against the fact store
//! once, up front, so the fixpoint and the checker run without touching the
//! store (and without a failure path).

use rustc_hash::{FxHashMap, FxHashSet};

use errflow_facts::{EntityKey, ErrorIdentity, FactError, FactStore, FunctionSummary};
use errflow_ir::visitor::{walk_call, walk_expr, walk_stmt, Visitor};
use errflow_ir::{
    Call, Callee, CasePattern, Expr, FuncRef, GlobalRef, GraphCallee, Stmt, Ty, TypeRef, Unit,
    ValueKind,
};

use crate::config::AnalysisConfig;
use crate::detect::Declarations;
use crate::dispatch::satisfies;

/// Identity and summary lookup for one unit.
pub struct UnitScope<'a> {
    unit: &'a Unit,
    config: &'a AnalysisConfig,
    decls: Declarations,
    /// Imported identities, keyed by the declaring entity.
    identities: FxHashMap<EntityKey, ErrorIdentity>,
    /// Imported function and method summaries.
    summaries: FxHashMap<FuncRef, FunctionSummary>,
}

impl<'a> UnitScope<'a> {
    /// Resolve every foreign entity `unit` mentions against `store`.
    pub fn build(
        unit: &'a Unit,
        config: &'a AnalysisConfig,
        decls: Declarations,
        store: &dyn FactStore,
    ) -> Result<Self, FactError> {
        let refs = References::collect(unit);

        let mut identities = FxHashMap::default();
        for global in &refs.globals {
            let key = EntityKey::global(global);
            if let Some(fact) = store.import_identity(&key)? {
                identities.insert(key, fact.identity());
            }
        }
        for ty in &refs.types {
            let key = EntityKey::type_decl(ty);
            if let Some(fact) = store.import_identity(&key)? {
                identities.insert(key, fact.identity());
            }
        }

        let mut summaries = FxHashMap::default();
        for func in &refs.functions {
            if let Some(mut summary) = store.import_summary(&EntityKey::func(func))? {
                let tracked = |id: &ErrorIdentity| !config.is_ignored(&id.unit);
                summary.errors = summary.errors.filtered(tracked);
                summary.checked = summary.checked.filtered(tracked);
                summaries.insert(func.clone(), summary);
            }
        }

        tracing::trace!(
            unit = %unit.path,
            identities = identities.len(),
            summaries = summaries.len(),
            "imports resolved"
        );

        Ok(UnitScope {
            unit,
            config,
            decls,
            identities,
            summaries,
        })
    }

    pub fn unit(&self) -> &'a Unit {
        self.unit
    }

    pub fn path(&self) -> &'a str {
        &self.unit.path
    }

    pub fn config(&self) -> &'a AnalysisConfig {
        self.config
    }

    pub fn decls(&self) -> &Declarations {
        &self.decls
    }

    /// Identities from ignored units are never tracked.
    pub fn is_tracked(&self, identity: &ErrorIdentity) -> bool {
        !self.config.is_ignored(&identity.unit)
    }

    /// The identity of a sentinel global, local or imported.
    pub fn global_identity(&self, global: &GlobalRef) -> Option<ErrorIdentity> {
        let identity = if global.unit == self.unit.path {
            self.decls.sentinel(&global.name)
        } else {
            self.identities.get(&EntityKey::global(global)).cloned()
        };
        identity.filter(|id| self.is_tracked(id))
    }

    /// The identity of a nominal error type, local or imported.
    pub fn type_identity(&self, ty: &TypeRef) -> Option<ErrorIdentity> {
        let identity = if ty.unit == self.unit.path {
            self.decls.error_type(&ty.name)
        } else {
            self.identities.get(&EntityKey::type_decl(ty)).cloned()
        };
        identity.filter(|id| self.is_tracked(id))
    }

    /// The identity behind a (possibly pointer-to) named type.
    pub fn ty_identity(&self, ty: &Ty) -> Option<ErrorIdentity> {
        ty.nominal().and_then(|ty| self.type_identity(ty))
    }

    /// The summary a dependency exported for `func`.
    pub fn imported_summary(&self, func: &FuncRef) -> Option<&FunctionSummary> {
        self.summaries.get(func)
    }
}

/// Paths of the units whose function summaries `unit` imports.
pub fn summary_dependencies(unit: &Unit) -> FxHashSet<String> {
    References::collect(unit)
        .functions
        .into_iter()
        .map(|func| func.unit)
        .collect()
}

/// Foreign entities mentioned anywhere in a unit.
#[derive(Default)]
struct References {
    path: String,
    globals: FxHashSet<GlobalRef>,
    types: FxHashSet<TypeRef>,
    functions: FxHashSet<FuncRef>,
}

impl References {
    fn collect(unit: &Unit) -> Self {
        let mut refs = References {
            path: unit.path.clone(),
            ..References::default()
        };

        for global in &unit.globals {
            if let Some(init) = &global.init {
                refs.visit_expr(init);
            }
        }
        for func in &unit.functions {
            for ty in &func.locals {
                refs.ty(ty);
            }
            if let Some(body) = &func.body {
                refs.visit_block(body);
            }
            if let Some(graph) = &func.graph {
                for kind in &graph.values {
                    refs.value(kind);
                }
            }
        }

        // Methods of imported implementations feed dispatch summaries.
        for iface in unit.reachable_interfaces() {
            for decl in unit.visible_types().filter(|decl| satisfies(decl, iface)) {
                for method in &iface.methods {
                    refs.function(decl.method_ref(&method.name));
                }
            }
        }

        refs
    }

    fn is_foreign(&self, unit: &str) -> bool {
        unit != self.path
    }

    fn global(&mut self, global: &GlobalRef) {
        if self.is_foreign(&global.unit) {
            self.globals.insert(global.clone());
        }
    }

    fn type_ref(&mut self, ty: &TypeRef) {
        if self.is_foreign(&ty.unit) {
            self.types.insert(ty.clone());
        }
    }

    fn ty(&mut self, ty: &Ty) {
        if let Some(named) = ty.nominal() {
            self.type_ref(named);
        }
    }

    fn function(&mut self, func: FuncRef) {
        if self.is_foreign(&func.unit) {
            self.functions.insert(func);
        }
    }

    fn value(&mut self, kind: &ValueKind) {
        match kind {
            ValueKind::Global(global) => self.global(global),
            ValueKind::Alloc(ty) => self.type_ref(ty),
            ValueKind::Function(func)
            | ValueKind::Call {
                callee: GraphCallee::Static(func),
                ..
            } => self.function(func.clone()),
            _ => {}
        }
    }
}

impl<'ast> Visitor<'ast> for References {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        if let Stmt::Switch { cases, .. } = stmt {
            for pattern in cases.iter().flat_map(|case| &case.patterns) {
                if let CasePattern::Type(ty) = pattern {
                    self.ty(ty);
                }
            }
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        match expr {
            Expr::Global(global) => self.global(global),
            Expr::Func(func) => self.function(func.clone()),
            Expr::Composite { ty } => self.type_ref(ty),
            Expr::TypeAssert { ty, .. } => self.ty(ty),
            _ => {}
        }
        walk_expr(self, expr);
    }

    fn visit_call(&mut self, call: &'ast Call) {
        if let Callee::Static(func) = &call.callee {
            self.function(func.clone());
        }
        walk_call(self, call);
    }
}
