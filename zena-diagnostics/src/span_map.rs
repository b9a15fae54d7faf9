/// Span tracking without modifying the AST.
///
/// Keyed by the stable `NodeId` the parser assigns each node, so spans
/// live in a side table rather than inline on every node.
use crate::Span;
use std::collections::HashMap;
use zena_ast::NodeId;

#[derive(Debug, Default, Clone)]
pub struct SpanMap {
    spans: HashMap<NodeId, Span>,
}

impl SpanMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: NodeId, span: Span) {
        self.spans.insert(id, span);
    }

    pub fn get(&self, id: NodeId) -> Option<&Span> {
        self.spans.get(&id)
    }

    pub fn get_or_unknown(&self, id: NodeId) -> Span {
        self.get(id).cloned().unwrap_or_else(Span::unknown)
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    pub fn stats(&self) -> usize {
        self.spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zena_ast::NodeIdGen;

    #[test]
    fn test_span_map() {
        let mut map = SpanMap::new();
        let mut gen = NodeIdGen::new();
        let span = Span::new("test.zena".to_string(), 10, 5, 100, 102);

        let id = gen.next();
        map.record(id, span.clone());
        assert_eq!(map.get(id), Some(&span));
    }

    #[test]
    fn test_multiple_nodes() {
        let mut map = SpanMap::new();
        let mut gen = NodeIdGen::new();

        let span1 = Span::new("test.zena".to_string(), 1, 1, 0, 5);
        let span2 = Span::new("test.zena".to_string(), 2, 1, 6, 11);

        let id1 = gen.next();
        let id2 = gen.next();

        map.record(id1, span1.clone());
        map.record(id2, span2.clone());

        assert_eq!(map.get(id1), Some(&span1));
        assert_eq!(map.get(id2), Some(&span2));
        assert_eq!(map.stats(), 2);
    }

    #[test]
    fn test_get_or_unknown_falls_back() {
        let map = SpanMap::new();
        let mut gen = NodeIdGen::new();
        let id = gen.next();
        assert_eq!(map.get_or_unknown(id), Span::unknown());
    }
}
