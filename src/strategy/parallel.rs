//! Parallel Rendering
//!
//! Uses Rayon to run independent pipelines concurrently. Filters, selectors
//! and serializers are shared read-only; every task builds its own stream.

use crate::error::Result;
use crate::filters::Filter;
use crate::output::Serializer;
use crate::stream::EventBuffer;
use crate::xpath::cache::compile_cached;
use rayon::prelude::*;

/// Filter and serialize many documents in parallel.
///
/// Results come back in input order.
pub fn render_parallel<F>(docs: &[EventBuffer], filter: &F, serializer: &Serializer) -> Vec<Result<String>>
where
    F: Filter + Sync + ?Sized,
{
    docs.par_iter()
        .map(|doc| filter.apply(doc.stream()).render(serializer))
        .collect()
}

/// Evaluate several paths against one document in parallel
pub fn select_parallel(doc: &EventBuffer, paths: &[&str]) -> Vec<Result<EventBuffer>> {
    paths
        .par_iter()
        .map(|path| doc.stream().select_path(path)?.materialize())
        .collect()
}

/// Evaluate keyed paths in parallel; the first error aborts the batch
pub fn select_map(doc: &EventBuffer, queries: &[(&str, &str)]) -> Result<Vec<(String, EventBuffer)>> {
    queries
        .par_iter()
        .map(|(key, path)| {
            let selector = compile_cached(path)?;
            let selected = doc.stream().select(&selector).materialize()?;
            Ok((key.to_string(), selected))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarkupError;
    use crate::filters::{Sanitizer, SanitizerConfig};
    use crate::reader;

    #[test]
    fn test_render_parallel_keeps_order() {
        let docs: Vec<EventBuffer> = (0..16)
            .map(|i| reader::html(&format!("<p>{i}</p><script>x</script>")).unwrap())
            .collect();
        let sanitizer = Sanitizer::new(SanitizerConfig::default());
        let results = render_parallel(&docs, &sanitizer, &Serializer::html());
        assert_eq!(results.len(), 16);
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), format!("<p>{i}</p>"));
        }
    }

    #[test]
    fn test_select_parallel() {
        let doc = reader::xml("<root><a/><b/><c/></root>").unwrap();
        let results = select_parallel(&doc, &["//a", "//b", "//c", "//["]);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().len(), 2);
        assert!(matches!(results[3], Err(MarkupError::SelectorSyntax { .. })));
    }

    #[test]
    fn test_select_map() {
        let doc = reader::xml("<root><a>1</a><b>2</b></root>").unwrap();
        let results = select_map(&doc, &[("first", "//a/text()"), ("second", "//b")]).unwrap();
        assert_eq!(results[0].0, "first");
        assert_eq!(results[0].1.len(), 1);
        assert_eq!(results[1].1.len(), 3);
    }
}
