//! Locating descriptive text for an `<img>` within its parsed document.
//!
//! Search order:
//! 1. a `<figcaption>` inside the nearest enclosing `<figure>`
//! 2. a sibling of the image's parent that looks like a caption (tag name or
//!    class containing `caption`), scanning forward and then backward
//! 3. the image's own `title` attribute
//!
//! The first non-empty text wins. Resolution only reads the tree, so calling
//! it twice on the same node returns the same text.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

static FIGCAPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("figcaption").expect("static selector"));

/// Best available caption for `img`, if any.
pub fn resolve_caption(img: ElementRef<'_>) -> Option<String> {
    figure_caption(img)
        .or_else(|| sibling_caption(img))
        .or_else(|| img.value().attr("title").and_then(clean))
}

fn figure_caption(img: ElementRef<'_>) -> Option<String> {
    let figure = img
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "figure")?;
    figure
        .select(&FIGCAPTION)
        .find_map(|caption| clean(&element_text(caption)))
}

fn sibling_caption(img: ElementRef<'_>) -> Option<String> {
    let parent = img.parent()?;
    let caption_text = |el: ElementRef<'_>| {
        if looks_like_caption(el) {
            clean(&element_text(el))
        } else {
            None
        }
    };
    parent
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find_map(caption_text)
        .or_else(|| {
            parent
                .prev_siblings()
                .filter_map(ElementRef::wrap)
                .find_map(caption_text)
        })
}

fn looks_like_caption(el: ElementRef<'_>) -> bool {
    el.value().name().contains("caption") || el.value().classes().any(|c| c.contains("caption"))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of whitespace; `None` when nothing is left.
fn clean(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first_img(doc: &Html) -> ElementRef<'_> {
        let sel = Selector::parse("img").unwrap();
        doc.select(&sel).next().unwrap()
    }

    #[test]
    fn test_figcaption_inside_figure() {
        let doc = Html::parse_document(
            r#"<figure><div><img src="a.jpg" title="ignored"></div>
               <figcaption>  The   prison dinner,
               Goodfellas </figcaption></figure>"#,
        );
        assert_eq!(
            resolve_caption(first_img(&doc)).as_deref(),
            Some("The prison dinner, Goodfellas")
        );
    }

    #[test]
    fn test_sibling_caption_forward_then_backward() {
        let forward = Html::parse_document(
            r#"<div><p class="credit">Credit</p><span><img src="a.jpg"></span>
               <p class="wp-caption-text">Timpano from Big Night</p></div>"#,
        );
        assert_eq!(
            resolve_caption(first_img(&forward)).as_deref(),
            Some("Timpano from Big Night")
        );

        let backward = Html::parse_document(
            r#"<div><div class="caption">Cubano sandwich, Chef</div>
               <span><img src="a.jpg"></span><p>unrelated</p></div>"#,
        );
        assert_eq!(
            resolve_caption(first_img(&backward)).as_deref(),
            Some("Cubano sandwich, Chef")
        );
    }

    #[test]
    fn test_empty_forward_caption_falls_back_to_backward() {
        let doc = Html::parse_document(
            r#"<div><p class="caption">Timpano, Big Night</p>
               <span><img src="a.jpg"></span><p class="caption"> </p></div>"#,
        );
        assert_eq!(
            resolve_caption(first_img(&doc)).as_deref(),
            Some("Timpano, Big Night")
        );
    }

    #[test]
    fn test_empty_figcaption_falls_through_to_title() {
        let doc = Html::parse_document(
            r#"<figure><img src="a.jpg" title=" Ratatouille "><figcaption> </figcaption></figure>"#,
        );
        assert_eq!(resolve_caption(first_img(&doc)).as_deref(), Some("Ratatouille"));
    }

    #[test]
    fn test_no_caption() {
        let doc = Html::parse_document(r#"<div><img src="a.jpg"></div>"#);
        assert_eq!(resolve_caption(first_img(&doc)), None);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let doc = Html::parse_document(
            r#"<figure><img src="a.jpg"><figcaption>Big Kahuna Burger</figcaption></figure>"#,
        );
        let img = first_img(&doc);
        assert_eq!(resolve_caption(img), resolve_caption(img));
    }
}
