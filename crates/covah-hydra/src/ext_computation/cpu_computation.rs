// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::context::ExtComputationContextImpl;
use super::descriptor::ExtComputationDescriptor;
use super::input_source::{
    CompExtCompInputSource, ExtCompInputSource, SceneExtCompInputSource, UnboundExtCompInputSource,
    EMPTY_VALUE,
};
use super::{ExtComputationCatalog, ExtComputationError};
use crate::buffer::{report_null_access, BufferSource, BufferSourceSharedPtr, BufferSpec, ResolveState};
use crate::scene_delegate::SceneDelegate;
use covah_core::graph::topological_levels;
use covah_core::{coding_error, PrimPath, Token, TupleType, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Returned by [`ExtCompCpuComputation::output_index`] for unknown names.
pub const INVALID_OUTPUT_INDEX: usize = usize::MAX;

/// A computation executed on the CPU by its scene delegate.
///
/// Resolving runs the delegate's callback once every input resolved and
/// stores the outputs in declaration order. A computation whose callback
/// fails, or whose upstream failed, resolves with an error and no outputs:
/// consumers see an absent value for the frame.
pub struct ExtCompCpuComputation {
    id: PrimPath,
    name: Token,
    inputs: Vec<Arc<dyn ExtCompInputSource>>,
    outputs: Vec<Token>,
    output_indices: HashMap<Token, usize>,
    num_elements: usize,
    scene_delegate: Arc<dyn SceneDelegate>,
    output_values: OnceLock<Vec<Value>>,
    state: ResolveState,
}

impl ExtCompCpuComputation {
    /// Same as the module-level [`INVALID_OUTPUT_INDEX`].
    pub const INVALID_OUTPUT_INDEX: usize = INVALID_OUTPUT_INDEX;

    /// Creates a computation. Prefer [`create_computation`] which also
    /// builds the inputs.
    ///
    /// [`create_computation`]: Self::create_computation
    pub fn new(
        id: PrimPath,
        inputs: Vec<Arc<dyn ExtCompInputSource>>,
        outputs: Vec<Token>,
        num_elements: usize,
        scene_delegate: Arc<dyn SceneDelegate>,
    ) -> Self {
        let output_indices = outputs
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();
        Self {
            name: id.to_token(),
            id,
            inputs,
            outputs,
            output_indices,
            num_elements,
            scene_delegate,
            output_values: OnceLock::new(),
            state: ResolveState::new(),
        }
    }

    /// Builds `computation` and every computation it transitively reads
    /// from, appending each new computation to `computation_sources` in
    /// dependency order.
    ///
    /// Upstream computations are looked up in `catalog`. A missing one leaves
    /// the consuming input unbound, and a dependency cycle is rejected.
    pub fn create_computation(
        scene_delegate: &Arc<dyn SceneDelegate>,
        computation: &ExtComputationDescriptor,
        catalog: &dyn ExtComputationCatalog,
        computation_sources: &mut Vec<Arc<ExtCompCpuComputation>>,
    ) -> Result<Arc<ExtCompCpuComputation>, ExtComputationError> {
        let mut built = build_graph(
            scene_delegate,
            vec![computation.clone()],
            catalog,
            computation_sources,
        )?;
        built
            .remove(&computation.id)
            .ok_or_else(|| ExtComputationError::UnknownComputation(computation.id.clone()))
    }

    /// Like [`create_computation`](Self::create_computation) for several
    /// computations at once, sharing the upstream computations they have in
    /// common.
    pub fn create_computations(
        scene_delegate: &Arc<dyn SceneDelegate>,
        ids: &[PrimPath],
        catalog: &dyn ExtComputationCatalog,
        computation_sources: &mut Vec<Arc<ExtCompCpuComputation>>,
    ) -> Result<HashMap<PrimPath, Arc<ExtCompCpuComputation>>, ExtComputationError> {
        let mut roots = Vec::with_capacity(ids.len());
        for id in ids {
            let descriptor = catalog
                .ext_computation(id)
                .ok_or_else(|| ExtComputationError::UnknownComputation(id.clone()))?;
            roots.push(descriptor.clone());
        }
        build_graph(scene_delegate, roots, catalog, computation_sources)
    }

    /// The computation prim.
    pub fn id(&self) -> &PrimPath {
        &self.id
    }

    /// The inputs, scene inputs first.
    pub fn inputs(&self) -> &[Arc<dyn ExtCompInputSource>] {
        &self.inputs
    }

    /// The output names, in index order.
    pub fn output_names(&self) -> &[Token] {
        &self.outputs
    }

    /// The computations feeding this one.
    pub fn upstream_computations(&self) -> Vec<Arc<ExtCompCpuComputation>> {
        self.inputs
            .iter()
            .filter_map(|input| input.source_computation().cloned())
            .collect()
    }

    /// The index of output `name`, or [`INVALID_OUTPUT_INDEX`].
    pub fn output_index(&self, name: &Token) -> usize {
        self.output_indices
            .get(name)
            .copied()
            .unwrap_or(INVALID_OUTPUT_INDEX)
    }

    /// The output at `index`.
    ///
    /// Calling this before the computation resolved, or with an index past
    /// the declared outputs, is a coding error. A computation that failed
    /// for the frame returns an empty value.
    pub fn output_by_index(&self, index: usize) -> &Value {
        if !self.state.is_resolved() {
            coding_error!("output {} of computation {} read before resolve", index, self.id);
            return &EMPTY_VALUE;
        }
        if index >= self.outputs.len() {
            coding_error!(
                "output index {} out of bounds for computation {} ({} outputs)",
                index,
                self.id,
                self.outputs.len()
            );
            return &EMPTY_VALUE;
        }
        self.output(index).unwrap_or(&EMPTY_VALUE)
    }

    /// The output at `index`, if the computation produced it.
    pub fn output(&self, index: usize) -> Option<&Value> {
        self.output_values.get().and_then(|values| values.get(index))
    }

    fn fail(&self, reason: fmt::Arguments<'_>) -> bool {
        log::warn!("Computation {} produced no output this frame: {}", self.id, reason);
        self.state.set_resolve_error();
        true
    }
}

fn build_graph(
    scene_delegate: &Arc<dyn SceneDelegate>,
    roots: Vec<ExtComputationDescriptor>,
    catalog: &dyn ExtComputationCatalog,
    computation_sources: &mut Vec<Arc<ExtCompCpuComputation>>,
) -> Result<HashMap<PrimPath, Arc<ExtCompCpuComputation>>, ExtComputationError> {
    let mut descriptors: Vec<ExtComputationDescriptor> = Vec::new();
    let mut index: HashMap<PrimPath, usize> = HashMap::new();
    let mut pending = roots;
    while let Some(descriptor) = pending.pop() {
        if index.contains_key(&descriptor.id) {
            continue;
        }
        for upstream in descriptor.upstream_ids() {
            if !index.contains_key(&upstream) {
                if let Some(found) = catalog.ext_computation(&upstream) {
                    pending.push(found.clone());
                }
            }
        }
        index.insert(descriptor.id.clone(), descriptors.len());
        descriptors.push(descriptor);
    }

    let edges: Vec<(usize, usize)> = descriptors
        .iter()
        .enumerate()
        .flat_map(|(dependent, descriptor)| {
            descriptor
                .upstream_ids()
                .into_iter()
                .filter_map(|upstream| index.get(&upstream).map(|&dependency| (dependency, dependent)))
                .collect::<Vec<_>>()
        })
        .collect();
    let levels = topological_levels(0..descriptors.len(), edges).map_err(|err| {
        ExtComputationError::Cycle {
            computations: err
                .unresolved
                .iter()
                .map(|&i| descriptors[i].id.clone())
                .collect(),
        }
    })?;

    let mut built: Vec<Option<Arc<ExtCompCpuComputation>>> = vec![None; descriptors.len()];
    for i in levels.into_iter().flatten() {
        let descriptor = &descriptors[i];
        let mut inputs: Vec<Arc<dyn ExtCompInputSource>> = Vec::new();
        for name in &descriptor.scene_input_names {
            let value = scene_delegate.get_ext_computation_input(&descriptor.id, name);
            inputs.push(Arc::new(SceneExtCompInputSource::new(name.clone(), value)));
        }
        for input in &descriptor.computation_inputs {
            let source = index
                .get(&input.source_computation_id)
                .and_then(|&j| built[j].clone());
            match source {
                Some(source) => inputs.push(Arc::new(CompExtCompInputSource::new(
                    input.name.clone(),
                    source,
                    &input.source_computation_output_name,
                ))),
                None => {
                    log::warn!(
                        "Computation {} reads '{}' from unknown computation {}",
                        descriptor.id,
                        input.name,
                        input.source_computation_id
                    );
                    inputs.push(Arc::new(UnboundExtCompInputSource::new(input.name.clone())));
                }
            }
        }
        let computation = Arc::new(ExtCompCpuComputation::new(
            descriptor.id.clone(),
            inputs,
            descriptor.output_names(),
            descriptor.element_count,
            scene_delegate.clone(),
        ));
        computation_sources.push(computation.clone());
        built[i] = Some(computation);
    }

    Ok(descriptors
        .into_iter()
        .zip(built)
        .filter_map(|(descriptor, computation)| computation.map(|c| (descriptor.id, c)))
        .collect())
}

impl fmt::Debug for ExtCompCpuComputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtCompCpuComputation")
            .field("id", &self.id)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs)
            .field("num_elements", &self.num_elements)
            .field("state", &self.state)
            .finish()
    }
}

impl BufferSource for ExtCompCpuComputation {
    fn name(&self) -> Token {
        self.name.clone()
    }

    fn data(&self) -> Option<&[u8]> {
        report_null_access("ExtCompCpuComputation", "data");
        None
    }

    fn tuple_type(&self) -> TupleType {
        report_null_access("ExtCompCpuComputation", "tuple_type");
        TupleType::INVALID
    }

    fn num_elements(&self) -> usize {
        self.num_elements
    }

    fn buffer_specs(&self, _specs: &mut Vec<BufferSpec>) {}

    fn resolve(&self) -> bool {
        if !self.check_valid() {
            return false;
        }
        // Every input gets a chance to resolve, even after one fails.
        let ready = self
            .inputs
            .iter()
            .fold(true, |ready, input| input.resolve() && ready);
        if !ready {
            return false;
        }
        if !self.state.try_lock() {
            return self.state.is_resolved();
        }

        if let Some(failed) = self
            .inputs
            .iter()
            .filter_map(|input| input.source_computation())
            .find(|source| source.has_resolve_error())
        {
            return self.fail(format_args!("upstream computation {} failed", failed.id));
        }

        let mut context = ExtComputationContextImpl::new();
        for input in &self.inputs {
            context.set_input_value(input.name(), input.value().clone());
        }
        self.scene_delegate.invoke_ext_computation(&self.id, &mut context);
        if context.has_computation_error() {
            return self.fail(format_args!("the scene delegate raised an error"));
        }

        let mut values = Vec::with_capacity(self.outputs.len());
        for name in &self.outputs {
            match context.take_output_value(name) {
                Some(value) => values.push(value),
                None => return self.fail(format_args!("output '{}' was not set", name)),
            }
        }
        let _ = self.output_values.set(values);
        self.state.set_resolved();
        true
    }

    fn state(&self) -> &ResolveState {
        &self.state
    }

    fn check_valid(&self) -> bool {
        self.inputs.iter().all(|input| input.is_valid())
    }

    fn compute_hash(&self) -> u64 {
        0
    }

    fn upstream_sources(&self) -> Vec<BufferSourceSharedPtr> {
        self.upstream_computations()
            .into_iter()
            .map(|computation| computation as BufferSourceSharedPtr)
            .collect()
    }
}
