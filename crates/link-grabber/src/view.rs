//! Display buckets over a classified link sequence.

use serde::Serialize;

use crate::classify::{classify, ClassifyOptions};
use crate::types::{ClassifiedLink, LinkRecord, SourceKind};

/// Column a visible link is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Anchors,
    Images,
    Scripts,
}

impl Bucket {
    pub fn title(&self) -> &'static str {
        match self {
            Bucket::Anchors => "HTML Links",
            Bucket::Images => "Images",
            Bucket::Scripts => "Embedded Links",
        }
    }

    fn of(link: &ClassifiedLink) -> Self {
        if link.is_image {
            Bucket::Images
        } else if link.link.source_kind == SourceKind::Script {
            Bucket::Scripts
        } else {
            Bucket::Anchors
        }
    }
}

/// Visible links split into buckets, in classified order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkView {
    pub anchors: Vec<ClassifiedLink>,
    pub images: Vec<ClassifiedLink>,
    pub scripts: Vec<ClassifiedLink>,
    /// Size of the collected link set before any hiding.
    pub total: usize,
}

impl LinkView {
    /// Apply hide flags and the text filter, then split into buckets.
    pub fn build(classified: Vec<ClassifiedLink>, total: usize, options: &ClassifyOptions) -> Self {
        let needle = options.filter.trim().to_lowercase();
        let mut view = LinkView {
            total,
            ..Default::default()
        };

        for link in classified {
            if options.hide_duplicates && link.is_duplicate {
                continue;
            }
            if options.hide_blocked_domains && link.is_blocked {
                continue;
            }
            if !needle.is_empty() && !link.link.href.to_lowercase().contains(&needle) {
                continue;
            }
            match Bucket::of(&link) {
                Bucket::Anchors => view.anchors.push(link),
                Bucket::Images => view.images.push(link),
                Bucket::Scripts => view.scripts.push(link),
            }
        }
        view
    }

    pub fn bucket(&self, bucket: Bucket) -> &[ClassifiedLink] {
        match bucket {
            Bucket::Anchors => &self.anchors,
            Bucket::Images => &self.images,
            Bucket::Scripts => &self.scripts,
        }
    }

    pub fn visible(&self) -> usize {
        self.anchors.len() + self.images.len() + self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible() == 0
    }

    /// Columns to show, in order.
    pub fn layout(&self) -> Vec<Bucket> {
        if self.scripts.is_empty() {
            vec![Bucket::Anchors, Bucket::Images]
        } else if self.anchors.is_empty() {
            vec![Bucket::Scripts, Bucket::Images]
        } else {
            vec![Bucket::Anchors, Bucket::Images, Bucket::Scripts]
        }
    }

    /// Visible hrefs in layout order.
    pub fn hrefs(&self) -> Vec<&str> {
        self.layout()
            .into_iter()
            .flat_map(|b| self.bucket(b).iter())
            .map(|c| c.link.href.as_str())
            .collect()
    }
}

/// Classify and bucket a collected link set in one step.
pub fn present<S: AsRef<str>>(
    links: &[LinkRecord],
    source_url: Option<&str>,
    blocked_domains: &[S],
    options: &ClassifyOptions,
) -> LinkView {
    let classified = classify(links, source_url, blocked_domains, options);
    LinkView::build(classified, links.len(), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseFilter;
    use crate::normalizer::Normalizer;

    fn record(url: &str, kind: SourceKind) -> LinkRecord {
        Normalizer::new("https://page.io/", NoiseFilter::permissive())
            .normalize(url, "", kind)
            .unwrap()
    }

    const NONE: &[&str] = &[];

    #[test]
    fn test_end_to_end_grouping() {
        let links: Vec<_> = [
            "https://x.com/u1",
            "https://x.com/u1",
            "https://docs.github.com/g",
            "https://app.example.com/p",
        ]
        .iter()
        .map(|u| record(u, SourceKind::Anchor))
        .collect();

        let view = present(
            &links,
            Some("https://example.com"),
            NONE,
            &ClassifyOptions::default(),
        );
        assert_eq!(
            view.hrefs(),
            vec![
                "https://app.example.com/p",
                "https://x.com/u1",
                "https://docs.github.com/g",
            ]
        );
        assert_eq!(view.total, 4);
        assert_eq!(view.visible(), 3);

        let shown = present(
            &links,
            Some("https://example.com"),
            NONE,
            &ClassifyOptions {
                hide_duplicates: false,
                ..Default::default()
            },
        );
        assert_eq!(shown.visible(), 4);
        assert!(shown.anchors[2].is_duplicate);
    }

    #[test]
    fn test_hiding_removes_union() {
        let links: Vec<_> = [
            "https://bad.com/a",
            "https://ok.com/a",
            "https://ok.com/a",
            "https://bad.com/a",
        ]
        .iter()
        .map(|u| record(u, SourceKind::Anchor))
        .collect();
        let view = present(&links, None, &["bad.com"], &ClassifyOptions::default());
        assert_eq!(view.hrefs(), vec!["https://ok.com/a"]);
    }

    #[test]
    fn test_filter_and_buckets() {
        let links = vec![
            record("https://site.io/Logo.png", SourceKind::Anchor),
            record("https://cdn.site.io/pic", SourceKind::Image),
            record("https://api.other.io/v1", SourceKind::Script),
            record("https://site.io/about", SourceKind::Anchor),
        ];
        let options = ClassifyOptions {
            group_by_domain: false,
            ..Default::default()
        };
        let view = present(&links, None, NONE, &options);
        assert_eq!(view.anchors.len(), 1);
        assert_eq!(view.images.len(), 2);
        assert_eq!(view.scripts.len(), 1);
        assert_eq!(
            view.layout(),
            vec![Bucket::Anchors, Bucket::Images, Bucket::Scripts]
        );

        let filtered = present(
            &links,
            None,
            NONE,
            &ClassifyOptions {
                filter: "  //SITE.IO/ ".into(),
                group_by_domain: false,
                ..Default::default()
            },
        );
        assert_eq!(
            filtered.hrefs(),
            vec!["https://site.io/about", "https://site.io/Logo.png"]
        );
        assert_eq!(filtered.total, 4);
    }

    #[test]
    fn test_layout_variants() {
        let only_scripts = vec![record("https://api.other.io/v1", SourceKind::Script)];
        let view = present(&only_scripts, None, NONE, &ClassifyOptions::default());
        assert_eq!(view.layout(), vec![Bucket::Scripts, Bucket::Images]);

        let empty = present::<&str>(&[], None, NONE, &ClassifyOptions::default());
        assert!(empty.is_empty());
        assert_eq!(empty.layout(), vec![Bucket::Anchors, Bucket::Images]);
    }
}
