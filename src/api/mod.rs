use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;

use crate::analysis::BackNeeds;
use crate::config::LowerConfig;
use crate::diagnostic::Diagnostic;
use crate::error::{LowerError, Result};
use crate::ir::{Component, Func, Module, Registry};
use crate::lower::{
    discover_taps, generate_back, generate_check, generate_exec, generate_validity_regs,
    generate_validity_taps, generation_failed, BackCx, CheckCx, ExecCx, FormKind, FormLedger,
    FormState, FormTrail, TapTable,
};
use crate::span::{Location, Span};


/// Everything lowering produces for one module.
#[derive(Clone, Debug)]
pub struct Lowered {
    pub needs: BackNeeds,
    /// Lookback functions, keyed by component.
    pub back: BTreeMap<String, Func>,
    /// Execute functions, keyed by component.
    pub exec: BTreeMap<String, Func>,
    pub check: Func,
    pub validity_regs: Func,
    pub validity_taps: Func,
    pub taps: TapTable,
    pub ledger: FormLedger,
}

impl Lowered {
    /// Every generated function: lookback, execute, then the whole-circuit
    /// functions.
    pub fn functions(&self) -> impl Iterator<Item = &Func> {
        self.back
            .values()
            .chain(self.exec.values())
            .chain([&self.check, &self.validity_regs, &self.validity_taps])
    }
}

/// Parse a module from its JSON form.
pub fn parse_module(text: &str, filename: &str) -> std::result::Result<Module, Diagnostic> {
    serde_json::from_str(text).map_err(|e| {
        Diagnostic::error(format!("invalid module '{}': {}", filename, e), Span::dummy())
    })
}

pub fn load_module(path: &Path) -> std::result::Result<Module, Diagnostic> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Diagnostic::error(
            format!("cannot read '{}': {}", path.display(), e),
            Span::dummy(),
        )
    })?;
    parse_module(&text, &path.display().to_string())
}

/// Run one generator, recording its trail and attributing a failure to
/// the call sites that required the form.
fn generate_form<F>(
    component: &Component,
    form: FormKind,
    required_by: &[Location],
    generate: F,
) -> (FormTrail, Result<Func>)
where
    F: FnOnce(&mut FormTrail) -> Result<Func>,
{
    let mut trail = FormTrail::new(&component.name, form);
    let result = generate(&mut trail).map_err(|err| {
        trail.advance(FormState::Failed);
        generation_failed(&component.name, form, component.loc(), required_by, err)
    });
    (trail, result)
}

/// Generate one form per component, in parallel when configured, and
/// collect them by name. The first failure in name order wins.
fn generate_all<F>(
    components: Vec<&Component>,
    config: &LowerConfig,
    ledger: &mut FormLedger,
    generate: F,
) -> Result<BTreeMap<String, Func>>
where
    F: Fn(&Component) -> (FormTrail, Result<Func>) + Sync,
{
    let results: Vec<(FormTrail, Result<Func>)> = if config.parallel {
        components.par_iter().map(|&c| generate(c)).collect()
    } else {
        components.iter().map(|&c| generate(c)).collect()
    };
    let mut funcs = BTreeMap::new();
    let mut first_error = None;
    for (trail, result) in results {
        let name = trail.component.clone();
        ledger.record(trail);
        match result {
            Ok(func) => {
                funcs.insert(name, func);
            }
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(funcs),
    }
}

fn lookback_forms(
    registry: &Registry<'_>,
    needs: &BackNeeds,
    config: &LowerConfig,
    ledger: &mut FormLedger,
) -> Result<BTreeMap<String, Func>> {
    let cx = BackCx { registry, needs };
    let needed: Vec<&Component> = registry.iter().filter(|c| needs.contains(&c.name)).collect();
    generate_all(needed, config, ledger, |component| {
        generate_form(component, FormKind::Back, needs.required_by(&component.name), |trail| {
            generate_back(component, &cx, config, trail)
        })
    })
}

fn execute_forms(
    registry: &Registry<'_>,
    needs: &BackNeeds,
    config: &LowerConfig,
    ledger: &mut FormLedger,
) -> Result<BTreeMap<String, Func>> {
    let cx = ExecCx { registry, needs };
    generate_all(registry.iter().collect(), config, ledger, |component| {
        generate_form(component, FormKind::Exec, &[], |trail| {
            generate_exec(component, &cx, config, trail)
        })
    })
}

/// Lower a type-checked module: lookback needs, lookback and execute
/// functions per component, the inlined check function, the validity
/// aggregate and the tap table.
pub fn lower_module(module: &Module, config: &LowerConfig) -> Result<Lowered> {
    let _span = tracing::info_span!(
        "lower_module",
        components = module.components.len(),
        entries = module.entry_points.len()
    )
    .entered();
    module.verify()?;

    let registry = module.registry();
    let needs = BackNeeds::analyze(&registry);
    let mut ledger = FormLedger::default();

    let back = lookback_forms(&registry, &needs, config, &mut ledger)?;
    let exec = execute_forms(&registry, &needs, config, &mut ledger)?;

    let cx = CheckCx {
        registry: &registry,
        backs: &back,
    };
    let mut trail = FormTrail::new("check", FormKind::Check);
    let check = generate_check(module, &cx, config, &mut trail);
    if check.is_err() {
        trail.advance(FormState::Failed);
    }
    ledger.record(trail);
    let check = check?;

    let validity_regs = generate_validity_regs(&check)?;
    let taps = discover_taps(&validity_regs)?;
    let validity_taps = generate_validity_taps(&validity_regs, &taps)?;

    tracing::info!(
        lookback = back.len(),
        execute = exec.len(),
        taps = taps.len(),
        fingerprint = %taps.fingerprint(),
        "module lowered"
    );
    Ok(Lowered {
        needs,
        back,
        exec,
        check,
        validity_regs,
        validity_taps,
        taps,
        ledger,
    })
}

/// Only the lookback-need analysis, for reporting.
pub fn analyze_needs(module: &Module) -> Result<BackNeeds> {
    module.verify()?;
    Ok(BackNeeds::analyze(&module.registry()))
}

/// Render a lowering error against the module's source text, or plainly
/// when the module carries none.
pub fn report_error(err: &LowerError, module: &Module) {
    let diag = err.to_diagnostic();
    match &module.source {
        Some(source) => diag.render(&source.name, &source.text),
        None => eprintln!("{}", diag.render_plain()),
    }
}
