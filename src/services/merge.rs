use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId, dictionary};
use tracing::info;

use crate::error::PipelineError;

/// Concatenate already-normalized PDFs into `out_dir/file_name`.
///
/// Pages are copied in input order, each source's own page order intact,
/// and the output is written once after every source has been folded in —
/// never incrementally, so a mid-run failure cannot leave a partial
/// document behind. Any input that fails to load aborts the whole merge.
///
/// Returns the output path and the total page count, which always equals
/// the sum of the inputs' page counts.
pub fn merge_documents(
    inputs: &[PathBuf],
    file_name: &str,
    out_dir: &Path,
) -> Result<(PathBuf, usize), PipelineError> {
    let mut max_id: u32 = 1;
    let mut pages_in_order: Vec<(ObjectId, Object)> = Vec::new();
    let mut carried_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut output = Document::with_version("1.5");

    for input in inputs {
        let merge_err = |detail: String| PipelineError::Merge {
            path: input.display().to_string(),
            detail,
        };

        let mut doc = Document::load(input).map_err(|e| merge_err(e.to_string()))?;

        // Shift object ids past everything collected so far so sources
        // cannot collide inside the combined document.
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages is keyed by page number, so iteration preserves the
        // source's own page order.
        for (_, page_id) in doc.get_pages() {
            let page = doc
                .get_object(page_id)
                .map_err(|e| merge_err(e.to_string()))?
                .clone();
            pages_in_order.push((page_id, page));
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    carried_objects.insert(object_id, object);
                }
            }
        }
    }

    if pages_in_order.is_empty() {
        return Err(PipelineError::Merge {
            path: out_dir.join(file_name).display().to_string(),
            detail: "no pages to merge".to_string(),
        });
    }

    for (object_id, object) in carried_objects {
        output.objects.insert(object_id, object);
    }

    let pages_id = output.new_object_id();
    for (page_id, object) in &pages_in_order {
        if let Object::Dictionary(dict) = object {
            let mut page = dict.clone();
            page.set("Parent", Object::Reference(pages_id));
            output.objects.insert(*page_id, Object::Dictionary(page));
        }
    }

    let kids: Vec<Object> = pages_in_order
        .iter()
        .map(|(id, _)| Object::Reference(*id))
        .collect();
    let page_count = kids.len();

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
    };
    output.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    output.trailer.set("Root", Object::Reference(catalog_id));
    output.max_id = output.objects.len() as u32;
    output.renumber_objects();
    output.compress();

    let target = out_dir.join(file_name);
    output.save(&target).map_err(|e| PipelineError::Merge {
        path: target.display().to_string(),
        detail: e.to_string(),
    })?;

    info!(pages = page_count, output = %target.display(), "merged documents");
    Ok((target, page_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;
    use lopdf::content::{Content, Operation};

    /// Build a PDF whose pages all share the given size, one page per
    /// entry in `texts`.
    fn test_pdf(path: &Path, page_size: (i64, i64), texts: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    page_size.0.into(),
                    page_size.1.into(),
                ],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn page_sizes(path: &Path) -> Vec<(i64, i64)> {
        let doc = Document::load(path).unwrap();
        let pages = doc.get_pages();
        let mut sizes = Vec::new();
        for page_number in 1..=pages.len() as u32 {
            let page = doc.get_object(pages[&page_number]).unwrap().as_dict().unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            sizes.push((
                media_box[2].as_i64().unwrap(),
                media_box[3].as_i64().unwrap(),
            ));
        }
        sizes
    }

    #[test]
    fn test_merge_preserves_input_order_and_page_counts() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        let c = dir.path().join("c.pdf");
        test_pdf(&a, (612, 792), &["Alpha 1", "Alpha 2"]);
        test_pdf(&b, (300, 400), &["Bravo 1"]);
        test_pdf(&c, (500, 500), &["Charlie 1"]);

        let inputs = vec![a, b, c];
        let (merged, count) = merge_documents(&inputs, "merged.pdf", dir.path()).unwrap();
        assert_eq!(count, 4);

        // Distinct page sizes per source prove the ordering.
        assert_eq!(
            page_sizes(&merged),
            vec![(612, 792), (612, 792), (300, 400), (500, 500)]
        );
    }

    #[test]
    fn test_merge_of_same_inputs_is_structurally_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        test_pdf(&a, (612, 792), &["One"]);
        test_pdf(&b, (200, 300), &["Two", "Three"]);

        let inputs = vec![a, b];
        let (first, first_count) = merge_documents(&inputs, "first.pdf", dir.path()).unwrap();
        let (second, second_count) = merge_documents(&inputs, "second.pdf", dir.path()).unwrap();

        assert_eq!(first_count, second_count);
        assert_eq!(page_sizes(&first), page_sizes(&second));
    }

    #[test]
    fn test_unreadable_input_aborts_the_merge() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        test_pdf(&good, (612, 792), &["Fine"]);
        let bad = dir.path().join("bad.pdf");
        std::fs::write(&bad, b"definitely not a pdf").unwrap();

        let inputs = vec![good, bad];
        let err = merge_documents(&inputs, "merged.pdf", dir.path()).unwrap_err();
        assert_eq!(err.kind(), "MergeError");
        assert!(err.to_string().contains("bad.pdf"));

        // The failed merge must not have written a partial output.
        assert!(!dir.path().join("merged.pdf").exists());
    }

    #[test]
    fn test_empty_input_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = merge_documents(&[], "merged.pdf", dir.path()).unwrap_err();
        assert_eq!(err.kind(), "MergeError");
    }
}
