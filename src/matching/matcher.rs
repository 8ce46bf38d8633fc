//! Implicit matching of destination properties to source properties

use std::cmp::Ordering;

use crate::config::MatchingStrategy;
use crate::convert::ConverterStore;
use crate::descriptor::{PropertyDescriptorProvider, TypeName, ValueType};
use crate::naming::NameTokenizer;
use crate::path::PropertyPath;

use super::strategy::unmatched_source_tokens;

/// Outcome of matching one type pair
#[derive(Debug, Clone, Default)]
pub struct ImplicitMatch {
    /// Resolved `(destination, source)` pairs in destination declaration order
    pub mappings: Vec<(PropertyPath, PropertyPath)>,
    /// Destination paths left unmapped because several sources tied
    pub ambiguous: Vec<AmbiguousMatch>,
}

/// A destination path with more than one equally good source candidate
#[derive(Debug, Clone)]
pub struct AmbiguousMatch {
    pub destination: PropertyPath,
    pub candidates: Vec<PropertyPath>,
}

struct SourceCandidate {
    path: PropertyPath,
    tokens: Vec<Vec<String>>,
}

enum Resolution<'a> {
    None,
    Resolved(&'a SourceCandidate),
    Ambiguous(Vec<&'a SourceCandidate>),
}

/// Pure matching function over two type shapes
///
/// Walks the destination property tree (bounded by `max_depth`, never
/// re-entering a type already on the current path) and, for every node,
/// searches the source tree for the closest compatible path under the
/// configured strategy. Shorter source paths win; equally long matches are
/// reported as ambiguous and left unmapped. With closeness ranking enabled,
/// only candidates that also leave as many source tokens unmatched tie.
pub struct ImplicitMatcher<'a> {
    descriptors: &'a dyn PropertyDescriptorProvider,
    tokenizer: &'a dyn NameTokenizer,
    converters: &'a ConverterStore,
    strategy: MatchingStrategy,
    max_depth: usize,
    closeness_ranking: bool,
}

impl<'a> ImplicitMatcher<'a> {
    pub fn new(
        descriptors: &'a dyn PropertyDescriptorProvider,
        tokenizer: &'a dyn NameTokenizer,
        converters: &'a ConverterStore,
    ) -> Self {
        Self {
            descriptors,
            tokenizer,
            converters,
            strategy: MatchingStrategy::default(),
            max_depth: 5,
            closeness_ranking: false,
        }
    }

    pub fn with_strategy(mut self, strategy: MatchingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn with_closeness_ranking(mut self, enabled: bool) -> Self {
        self.closeness_ranking = enabled;
        self
    }

    /// Match every reachable destination property of `destination` against `source`
    pub fn match_types(&self, source: &TypeName, destination: &TypeName) -> ImplicitMatch {
        let mut candidates = Vec::new();
        let mut source_stack = vec![source.clone()];
        self.collect_sources(
            source,
            &PropertyPath::root(),
            &[],
            &mut source_stack,
            &mut candidates,
        );

        let mut result = ImplicitMatch::default();
        let mut destination_stack = vec![destination.clone()];
        self.match_destination(
            destination,
            &PropertyPath::root(),
            &[],
            &mut destination_stack,
            &candidates,
            &mut result,
        );
        result
    }

    fn collect_sources(
        &self,
        type_name: &TypeName,
        prefix: &PropertyPath,
        prefix_tokens: &[Vec<String>],
        stack: &mut Vec<TypeName>,
        candidates: &mut Vec<SourceCandidate>,
    ) {
        let Some(descriptor) = self.descriptors.describe(type_name) else {
            return;
        };

        for property in descriptor.properties().iter().filter(|p| p.is_readable()) {
            let path = prefix.child(property.clone());
            let mut tokens = prefix_tokens.to_vec();
            tokens.push(self.tokenizer.tokenize(property.name()));

            if let Some(nested) = self.descendable(property.value_type(), path.len(), stack) {
                stack.push(nested.clone());
                self.collect_sources(&nested, &path, &tokens, stack, candidates);
                stack.pop();
            }

            candidates.push(SourceCandidate { path, tokens });
        }
    }

    fn match_destination(
        &self,
        type_name: &TypeName,
        prefix: &PropertyPath,
        prefix_tokens: &[Vec<String>],
        stack: &mut Vec<TypeName>,
        candidates: &[SourceCandidate],
        result: &mut ImplicitMatch,
    ) {
        let Some(descriptor) = self.descriptors.describe(type_name) else {
            return;
        };

        for property in descriptor.properties().iter().filter(|p| p.is_writable()) {
            let path = prefix.child(property.clone());
            let mut tokens = prefix_tokens.to_vec();
            tokens.push(self.tokenizer.tokenize(property.name()));

            let nested = self.descendable(property.value_type(), path.len(), stack);
            match self.resolve(&tokens, property.value_type(), nested.is_none(), candidates) {
                Resolution::Resolved(candidate) => {
                    result.mappings.push((path, candidate.path.clone()));
                    continue;
                }
                Resolution::Ambiguous(tied) => {
                    tracing::debug!(
                        destination = %path,
                        candidates = tied.len(),
                        "Ambiguous implicit match left unmapped"
                    );
                    result.ambiguous.push(AmbiguousMatch {
                        destination: path.clone(),
                        candidates: tied.iter().map(|c| c.path.clone()).collect(),
                    });
                }
                Resolution::None => {}
            }

            if let Some(nested) = nested {
                stack.push(nested.clone());
                self.match_destination(&nested, &path, &tokens, stack, candidates, result);
                stack.pop();
            }
        }
    }

    /// Object type worth descending into: within depth, not already on the
    /// current path, and describable
    fn descendable(
        &self,
        value_type: &ValueType,
        depth: usize,
        stack: &[TypeName],
    ) -> Option<TypeName> {
        let nested = value_type.object_type()?;
        if depth >= self.max_depth || stack.contains(nested) {
            return None;
        }
        self.descriptors.describe(nested)?;
        Some(nested.clone())
    }

    fn resolve<'c>(
        &self,
        destination_tokens: &[Vec<String>],
        destination_type: &ValueType,
        allow_nested: bool,
        candidates: &'c [SourceCandidate],
    ) -> Resolution<'c> {
        let mut best: Option<(usize, usize)> = None;
        let mut tied: Vec<&SourceCandidate> = Vec::new();

        for candidate in candidates {
            let Some(source_type) = candidate.path.leaf_type() else {
                continue;
            };
            if !self.compatible(source_type, destination_type, allow_nested)
                || !self.strategy.matches(destination_tokens, &candidate.tokens)
            {
                continue;
            }

            let closeness = if self.closeness_ranking {
                unmatched_source_tokens(destination_tokens, &candidate.tokens)
            } else {
                0
            };
            let rank = (candidate.path.len(), closeness);
            match best.map(|b| rank.cmp(&b)) {
                None | Some(Ordering::Less) => {
                    best = Some(rank);
                    tied.clear();
                    tied.push(candidate);
                }
                Some(Ordering::Equal) => tied.push(candidate),
                Some(Ordering::Greater) => {}
            }
        }

        match tied.len() {
            0 => Resolution::None,
            1 => Resolution::Resolved(tied[0]),
            _ => Resolution::Ambiguous(tied),
        }
    }

    fn compatible(&self, source: &ValueType, destination: &ValueType, allow_nested: bool) -> bool {
        match (source, destination) {
            (s, d) if s == d => true,
            (ValueType::Any, _) | (_, ValueType::Any) => true,
            (ValueType::Object(_), ValueType::Object(_)) => allow_nested,
            (ValueType::List(s), ValueType::List(d)) => self.compatible(s, d, true),
            (s, d) if s.is_scalar() && d.is_scalar() => self.converters.supports(s, d),
            _ => false,
        }
    }
}
