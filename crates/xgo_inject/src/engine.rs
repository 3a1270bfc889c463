//! The per-package injection driver.

use std::collections::HashSet;

use tracing::{debug, trace};
use xgo_common::{GoVersion, Ident, Interner};

use crate::conversion::ArgConversion;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::InjectError;
use crate::funcs::FuncId;
use crate::ir::{Func, Package};
use crate::link::{LinkPolicy, LinkRequest, LinkTable, Verdict};
use crate::records::RewriteRecords;
use crate::rewrite::{HookPoint, RuntimeCallRewrite, GET_CALLER_PC};
use crate::typecheck::Checker;

/// What happened to one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncOutcome {
    /// Not a link request.
    Untouched,
    /// A link request the policy rejected; the body stays unresolved.
    Rejected,
    /// A permitted link bound to its runtime symbol.
    Bound,
    /// A hook point whose body was replaced.
    Rewritten,
    /// A hook point rewritten by an earlier run.
    AlreadyRewritten,
}

/// Per-package summary.
#[derive(Debug, Clone, Default)]
pub struct PackageReport {
    /// Outcome of every function that was not [`FuncOutcome::Untouched`].
    pub outcomes: Vec<(FuncId, FuncOutcome)>,
    /// Errors emitted by the re-check.
    pub errors: usize,
}

impl PackageReport {
    /// Number of functions with the given outcome.
    pub fn count(&self, outcome: FuncOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// Validates link requests and rewrites hook points, one package at a time.
pub struct InjectionEngine<'a> {
    interner: &'a Interner,
    table: LinkTable,
    policy: LinkPolicy,
    conversion: ArgConversion,
    runtime_symbols: HashSet<Ident>,
    link_requests: HashSet<Ident>,
    caller_pc: Ident,
    records: RewriteRecords,
    sink: DiagnosticSink,
}

impl<'a> InjectionEngine<'a> {
    /// An engine with the standard link table and policy for a toolchain.
    pub fn new(interner: &'a Interner, version: GoVersion) -> Self {
        Self::with_parts(
            interner,
            LinkTable::standard(),
            LinkPolicy::default(),
            ArgConversion::for_version(version),
        )
    }

    /// An engine with an explicit table, policy and argument strategy.
    pub fn with_parts(
        interner: &'a Interner,
        table: LinkTable,
        policy: LinkPolicy,
        conversion: ArgConversion,
    ) -> Self {
        let caller_pc = interner.intern(GET_CALLER_PC);
        let mut runtime_symbols: HashSet<Ident> =
            table.targets().map(|t| interner.intern(t)).collect();
        runtime_symbols.insert(caller_pc);
        let link_requests = table.requesters().map(|r| interner.intern(r)).collect();
        Self {
            interner,
            table,
            policy,
            conversion,
            runtime_symbols,
            link_requests,
            caller_pc,
            records: RewriteRecords::new(),
            sink: DiagnosticSink::new(),
        }
    }

    /// Replaces the link policy.
    pub fn with_policy(mut self, policy: LinkPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The argument strategy selected for this engine.
    pub fn conversion(&self) -> ArgConversion {
        self.conversion
    }

    /// Replacement bodies installed so far.
    pub fn records(&self) -> &RewriteRecords {
        &self.records
    }

    /// The diagnostics sink.
    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    /// Takes all diagnostics emitted so far.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.sink.take_all()
    }

    /// Validates and, for hook points, rewrites one function of `pkg_path`.
    ///
    /// Running this again on the same function changes nothing.
    pub fn process_func(&mut self, pkg_path: &str, func: &mut Func) -> Result<FuncOutcome, InjectError> {
        let interner = self.interner;
        let requester = interner.resolve(func.name);
        let Some(target) = self.table.target(requester) else {
            return Ok(FuncOutcome::Untouched);
        };
        if func.rewritten {
            return Ok(FuncOutcome::AlreadyRewritten);
        }
        if func.body.is_some() || func.binding.is_some() {
            // only body-less declarations are link requests
            return Ok(FuncOutcome::Untouched);
        }

        let req = LinkRequest {
            requester,
            target,
            pkg_path,
        };
        if self.policy.check(&req) == Verdict::Rejected {
            debug!(requester, pkg = pkg_path, "link rejected");
            return Ok(FuncOutcome::Rejected);
        }

        let target = interner.intern(target);
        let Some(hook) = HookPoint::from_requester(requester) else {
            trace!(requester, pkg = pkg_path, "link bound");
            func.binding = Some(target);
            return Ok(FuncOutcome::Bound);
        };

        let pass = RuntimeCallRewrite {
            hook,
            target,
            conversion: self.conversion,
            caller_pc: self.caller_pc,
        };
        match pass.apply(func, interner)? {
            Some(body) => {
                debug!(requester, pkg = pkg_path, "hook point rewritten");
                self.records.record(pkg_path, requester, body);
                Ok(FuncOutcome::Rewritten)
            }
            None => Ok(FuncOutcome::AlreadyRewritten),
        }
    }

    /// Processes every function of `pkg`, then re-checks them all.
    ///
    /// Diagnostics left over from an earlier package are discarded first, so
    /// the sink only ever holds the findings of the last package processed.
    pub fn process_package(&mut self, pkg: &mut Package) -> Result<PackageReport, InjectError> {
        self.sink.take_all();
        let mut report = PackageReport::default();
        for (id, func) in pkg.funcs.iter_mut() {
            let outcome = self.process_func(&pkg.path, func)?;
            if outcome != FuncOutcome::Untouched {
                report.outcomes.push((id, outcome));
            }
        }

        let checker = Checker::new(
            self.interner,
            &self.runtime_symbols,
            &self.link_requests,
            &pkg.path,
        );
        report.errors = pkg
            .funcs
            .iter()
            .map(|(_, func)| checker.check_func(func, &self.sink))
            .sum();
        Ok(report)
    }

    /// Fails unless the link table maps both hook points.
    pub fn require_hook_targets(&self) -> Result<(), InjectError> {
        for hook in [HookPoint::OnTestStart, HookPoint::TrapForGenerated] {
            if self.table.target(hook.requester()).is_none() {
                return Err(InjectError::UnmappedHook {
                    requester: hook.requester().to_string(),
                });
            }
        }
        Ok(())
    }
}
