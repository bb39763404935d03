//! Delta-debugging sequence shrinker plus per-argument value shrinking
//! (spec §3 "Shrinker", §4.6, §8 property 5).
//!
//! Grounded in the teacher's `evm::minimizer::EVMMinimizer::minimize`: try
//! removing each element, keep the removal if the failure still
//! reproduces, repeat until a fixpoint. This module generalizes that to
//! the spec's two-pass shrink (element removal, then per-argument value
//! shrinking via `ShrinkingMutator`) and runs it against a caller-supplied
//! verification predicate rather than the teacher's oracle-specific
//! re-execution, so the same shrinker serves property, assertion, and
//! optimization failures alike.

use crate::abi::{encode_call, Mutator, ShrinkingMutator};
use crate::config::MutationConfig;
use crate::contracts::MethodAbi;
use crate::error::{FuzzError, FuzzResult};
use crate::rand_provider::RandProvider;
use crate::sequence::CallSequence;
use crate::value_set::ValueSet;

/// A still-reproducing counterexample the shrinker should minimize,
/// together with enough ABI context to re-encode calldata after shrinking
/// an element's decoded arguments (spec §4.6 step 2).
pub struct ShrinkRequest<'a> {
    pub sequence: CallSequence,
    /// Per-element method ABI, `None` for elements whose calldata isn't a
    /// known method call (e.g. a plain value transfer) and therefore can
    /// only be removed, never argument-shrunk.
    pub element_methods: Vec<Option<&'a MethodAbi>>,
}

/// `predicate(sequence)` re-executes `sequence` against a freshly forked
/// chain and reports whether the original failure still reproduces (spec
/// §4.6 "All shrink evaluations run on a freshly forked chain state").
pub type VerifyPredicate<'p> = dyn Fn(&CallSequence) -> FuzzResult<bool> + 'p;

/// Two-pass shrink: remove elements by delta debugging until a fixpoint,
/// then shrink each remaining element's decoded arguments toward zero/empty
/// (spec §4.6). Stops after `round_budget` total predicate evaluations or
/// once a full pass makes no further progress, whichever comes first.
pub fn shrink(
    request: ShrinkRequest<'_>,
    predicate: &VerifyPredicate<'_>,
    rng: &mut RandProvider,
    pool: &ValueSet,
    cfg: &MutationConfig,
    round_budget: usize,
) -> FuzzResult<CallSequence> {
    if !predicate(&request.sequence)? {
        return Err(FuzzError::ShrinkFailed(
            "verification predicate did not hold on the original sequence".to_string(),
        ));
    }

    let mut rounds_used = 0usize;
    let (mut sequence, mut methods) = remove_elements(
        request.sequence,
        request.element_methods,
        predicate,
        round_budget,
        &mut rounds_used,
    )?;

    while rounds_used < round_budget {
        let (shrunk, improved) =
            shrink_arguments_once(&sequence, &methods, predicate, rng, pool, cfg, round_budget, &mut rounds_used)?;
        sequence = shrunk;
        if !improved {
            break;
        }
        // Element removal may become possible again after arguments shrink
        // (e.g. a shrunk amount makes a later call a no-op the chain
        // rejects identically whether present or not); re-run it once more
        // per spec §4.6's "iterate until the round budget is exhausted or
        // neither pass makes progress".
        let (re_removed, re_methods) =
            remove_elements(sequence, methods, predicate, round_budget, &mut rounds_used)?;
        sequence = re_removed;
        methods = re_methods;
    }

    Ok(sequence)
}

fn remove_elements<'a>(
    mut sequence: CallSequence,
    mut methods: Vec<Option<&'a MethodAbi>>,
    predicate: &VerifyPredicate<'_>,
    round_budget: usize,
    rounds_used: &mut usize,
) -> FuzzResult<(CallSequence, Vec<Option<&'a MethodAbi>>)> {
    loop {
        let mut removed_any = false;
        let mut idx = 0;
        while idx < sequence.len() {
            if *rounds_used >= round_budget {
                return Ok((sequence, methods));
            }
            let candidate = sequence.without(idx);
            *rounds_used += 1;
            if predicate(&candidate)? {
                sequence = candidate;
                methods.remove(idx);
                removed_any = true;
                // Re-check this index; the next element has shifted down.
            } else {
                idx += 1;
            }
        }
        if !removed_any {
            return Ok((sequence, methods));
        }
    }
}

/// One pass over every element's decoded arguments: shrink each toward
/// zero/empty via `ShrinkingMutator`, re-encode calldata, keep the change
/// only if the predicate still holds. Returns whether anything shrank.
#[allow(clippy::too_many_arguments)]
fn shrink_arguments_once(
    sequence: &CallSequence,
    methods: &[Option<&MethodAbi>],
    predicate: &VerifyPredicate<'_>,
    rng: &mut RandProvider,
    pool: &ValueSet,
    cfg: &MutationConfig,
    round_budget: usize,
    rounds_used: &mut usize,
) -> FuzzResult<(CallSequence, bool)> {
    let mut sequence = sequence.clone();
    let mut improved = false;

    for idx in 0..sequence.len() {
        let Some(method) = methods[idx] else { continue };
        let Some(values) = sequence.elements[idx].data_abi_values.clone() else { continue };
        if values.input_values.is_empty() {
            continue;
        }

        let mut shrunk_values = Vec::with_capacity(values.input_values.len());
        let mut any_field_changed = false;
        for ((_, ty), value) in method.inputs.iter().zip(values.input_values.iter()) {
            if *rounds_used >= round_budget {
                break;
            }
            let candidate_value = ShrinkingMutator.mutate(ty, value, rng, pool, cfg)?;
            if candidate_value == *value {
                shrunk_values.push(value.clone());
                continue;
            }

            let mut trial_values = values.input_values.clone();
            trial_values[shrunk_values.len()] = candidate_value.clone();
            let types: Vec<_> = method.inputs.iter().map(|(_, t)| t.clone()).collect();
            let calldata = encode_call(method.selector(), &types, &trial_values)?;

            let mut candidate_sequence = sequence.clone();
            candidate_sequence.elements[idx].data = calldata;
            *rounds_used += 1;
            if predicate(&candidate_sequence)? {
                sequence = candidate_sequence;
                shrunk_values.push(candidate_value);
                any_field_changed = true;
            } else {
                shrunk_values.push(value.clone());
            }
        }
        if any_field_changed {
            improved = true;
            if let Some(abi_values) = &mut sequence.elements[idx].data_abi_values {
                abi_values.input_values = shrunk_values;
            }
        }
    }

    Ok((sequence, improved))
}
