//! Boosted Haar cascade model
//!
//! Viola-Jones detector stages as trained by OpenCV: each stage sums the
//! leaf outputs of its weak classifiers (stumps or small trees over Haar
//! features) and rejects the window when the sum falls below the stage
//! threshold. Feature responses are normalized by the standard deviation of
//! the window interior so the cascade is insensitive to global contrast.

use std::path::Path;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use roxmltree::Node;
use tracing::info;

use crate::CascadeError;

/// Weighted rectangle of a Haar feature, in window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f32,
}

/// Haar feature: weighted sum of up to three rectangles
#[derive(Debug, Clone, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

/// Split node of a weak classifier tree.
///
/// Child values `<= 0` index (negated) into the leaf values, positive
/// values index the next node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f32,
}

/// Weak classifier (decision stump or small tree)
#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f32>,
}

/// Boosted stage
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub threshold: f32,
    pub classifiers: Vec<WeakClassifier>,
}

/// Integral and squared-integral images of one pyramid level
pub(crate) struct IntegralImages {
    sum: ImageBuffer<Luma<u64>, Vec<u64>>,
    sq_sum: ImageBuffer<Luma<u64>, Vec<u64>>,
}

impl IntegralImages {
    pub(crate) fn new(image: &GrayImage) -> Self {
        Self {
            sum: integral_image::<_, u64>(image),
            sq_sum: integral_squared_image::<_, u64>(image),
        }
    }

    fn rect(table: &ImageBuffer<Luma<u64>, Vec<u64>>, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let a = table.get_pixel(x, y)[0];
        let b = table.get_pixel(x + w, y)[0];
        let c = table.get_pixel(x, y + h)[0];
        let d = table.get_pixel(x + w, y + h)[0];
        (a + d) - (b + c)
    }

    fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::rect(&self.sum, x, y, w, h)
    }

    fn sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::rect(&self.sq_sum, x, y, w, h)
    }
}

/// Boosted Haar cascade with a fixed base window
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window: (u32, u32),
    features: Vec<HaarFeature>,
    stages: Vec<Stage>,
}

impl HaarCascade {
    /// Build a cascade, validating every index and rectangle against the window
    pub fn new(
        window: (u32, u32),
        features: Vec<HaarFeature>,
        stages: Vec<Stage>,
    ) -> Result<Self, CascadeError> {
        let (w, h) = window;
        if w < 3 || h < 3 {
            return Err(CascadeError::Invalid(format!("window {}x{} too small", w, h)));
        }
        if stages.is_empty() {
            return Err(CascadeError::Invalid("no stages".into()));
        }

        for (i, feature) in features.iter().enumerate() {
            if feature.rects.is_empty() {
                return Err(CascadeError::Invalid(format!("feature {} has no rectangles", i)));
            }
            for r in &feature.rects {
                let right = r.x.checked_add(r.width);
                let bottom = r.y.checked_add(r.height);
                if !matches!((right, bottom), (Some(rx), Some(by)) if rx <= w && by <= h) {
                    return Err(CascadeError::Invalid(format!(
                        "feature {} rectangle exceeds {}x{} window",
                        i, w, h
                    )));
                }
            }
        }

        for (si, stage) in stages.iter().enumerate() {
            for classifier in &stage.classifiers {
                if classifier.nodes.is_empty() {
                    return Err(CascadeError::Invalid(format!("stage {} has an empty classifier", si)));
                }
                for (ni, node) in classifier.nodes.iter().enumerate() {
                    if node.feature >= features.len() {
                        return Err(CascadeError::Invalid(format!(
                            "stage {} references missing feature {}",
                            si, node.feature
                        )));
                    }
                    for child in [node.left, node.right] {
                        let valid = if child <= 0 {
                            (child.unsigned_abs() as usize) < classifier.leaves.len()
                        } else {
                            // Children must point forward so evaluation terminates
                            (child as usize) > ni && (child as usize) < classifier.nodes.len()
                        };
                        if !valid {
                            return Err(CascadeError::Invalid(format!(
                                "stage {} has dangling tree child {}",
                                si, child
                            )));
                        }
                    }
                }
            }
        }

        Ok(Self { window, features, stages })
    }

    /// Load an OpenCV cascade XML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CascadeError> {
        let path = path.as_ref();
        info!("Loading cascade from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_xml(&text)
    }

    /// Parse OpenCV's `opencv-cascade-classifier` XML (BOOST stages, HAAR features)
    pub fn from_xml(text: &str) -> Result<Self, CascadeError> {
        let doc = roxmltree::Document::parse(text)?;
        let cascade = elements(doc.root_element())
            .find(|n| child(*n, "stages").is_some())
            .ok_or_else(|| CascadeError::Format("no cascade with <stages> found".into()))?;

        if let Some(kind) = child(cascade, "stageType") {
            if text_of(kind).trim() != "BOOST" {
                return Err(CascadeError::Unsupported(format!("stage type {}", text_of(kind).trim())));
            }
        }
        let feature_type = child(cascade, "featureType")
            .map(|n| text_of(n).trim().to_string())
            .unwrap_or_default();
        if feature_type != "HAAR" {
            return Err(CascadeError::Unsupported(format!("feature type '{}'", feature_type)));
        }

        let width = parse_scalar::<u32>(required(cascade, "width")?)?;
        let height = parse_scalar::<u32>(required(cascade, "height")?)?;

        let mut stages = Vec::new();
        for stage in elements(required(cascade, "stages")?) {
            let threshold = parse_scalar::<f32>(required(stage, "stageThreshold")?)?;
            let mut classifiers = Vec::new();
            for weak in elements(required(stage, "weakClassifiers")?) {
                classifiers.push(parse_weak(weak)?);
            }
            stages.push(Stage { threshold, classifiers });
        }

        let mut features = Vec::new();
        for feature in elements(required(cascade, "features")?) {
            if let Some(tilted) = child(feature, "tilted") {
                if parse_scalar::<i32>(tilted)? != 0 {
                    return Err(CascadeError::Unsupported("tilted Haar features".into()));
                }
            }
            let mut rects = Vec::new();
            for rect in elements(required(feature, "rects")?) {
                let v = parse_list::<f32>(rect)?;
                if v.len() != 5 || v[..4].iter().any(|c| *c < 0.0) {
                    return Err(CascadeError::Format(format!("bad feature rectangle {:?}", v)));
                }
                rects.push(WeightedRect {
                    x: v[0] as u32,
                    y: v[1] as u32,
                    width: v[2] as u32,
                    height: v[3] as u32,
                    weight: v[4],
                });
            }
            features.push(HaarFeature { rects });
        }

        let cascade = Self::new((width, height), features, stages)?;
        info!(
            "Cascade ready: {}x{} window, {} stages, {} features",
            width,
            height,
            cascade.stages.len(),
            cascade.features.len()
        );
        Ok(cascade)
    }

    /// Base detection window (width, height)
    pub fn window(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run the cascade on the window whose top-left corner is (x, y).
    ///
    /// The window must lie inside the image the integral tables were built from.
    pub(crate) fn evaluate(&self, ii: &IntegralImages, x: u32, y: u32) -> bool {
        let (w, h) = self.window;
        let (iw, ih) = (w - 2, h - 2);
        let area = (iw * ih) as f64;

        let sum = ii.sum(x + 1, y + 1, iw, ih) as f64;
        let sq_sum = ii.sq_sum(x + 1, y + 1, iw, ih) as f64;
        let mean = sum / area;
        let variance = sq_sum / area - mean * mean;
        let std_dev = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        for stage in &self.stages {
            let mut total = 0.0f64;
            for classifier in &stage.classifiers {
                let mut idx = 0usize;
                loop {
                    let node = &classifier.nodes[idx];
                    let response = self.feature_response(node.feature, ii, x, y) / area;
                    let next = if response < node.threshold as f64 * std_dev {
                        node.left
                    } else {
                        node.right
                    };
                    if next <= 0 {
                        total += classifier.leaves[next.unsigned_abs() as usize] as f64;
                        break;
                    }
                    idx = next as usize;
                }
            }
            if total < stage.threshold as f64 {
                return false;
            }
        }
        true
    }

    fn feature_response(&self, feature: usize, ii: &IntegralImages, x: u32, y: u32) -> f64 {
        self.features[feature]
            .rects
            .iter()
            .map(|r| r.weight as f64 * ii.sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }

    /// Convenience for one-off checks on a full image
    pub fn matches_at(&self, image: &GrayImage, x: u32, y: u32) -> bool {
        let (w, h) = self.window;
        let fits = x.checked_add(w).is_some_and(|r| r <= image.width())
            && y.checked_add(h).is_some_and(|b| b <= image.height());
        if !fits {
            return false;
        }
        self.evaluate(&IntegralImages::new(image), x, y)
    }
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

fn required<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, CascadeError> {
    child(node, name).ok_or_else(|| {
        CascadeError::Format(format!("<{}> missing <{}>", node.tag_name().name(), name))
    })
}

fn text_of<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("")
}

fn parse_list<T: std::str::FromStr>(node: Node) -> Result<Vec<T>, CascadeError> {
    text_of(node)
        .split_whitespace()
        .map(|tok| {
            tok.parse::<T>().map_err(|_| {
                CascadeError::Format(format!("bad number '{}' in <{}>", tok, node.tag_name().name()))
            })
        })
        .collect()
}

fn parse_scalar<T: std::str::FromStr>(node: Node) -> Result<T, CascadeError> {
    let mut values = parse_list::<T>(node)?;
    if values.len() != 1 {
        return Err(CascadeError::Format(format!(
            "<{}> should hold one value",
            node.tag_name().name()
        )));
    }
    Ok(values.remove(0))
}

fn parse_weak(weak: Node) -> Result<WeakClassifier, CascadeError> {
    let raw = parse_list::<f64>(required(weak, "internalNodes")?)?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(CascadeError::Format(format!(
            "internalNodes length {} is not a multiple of 4",
            raw.len()
        )));
    }
    let nodes = raw
        .chunks_exact(4)
        .map(|n| {
            if n[2] < 0.0 {
                return Err(CascadeError::Format(format!("negative feature index {}", n[2])));
            }
            Ok(TreeNode {
                left: n[0] as i32,
                right: n[1] as i32,
                feature: n[2] as usize,
                threshold: n[3] as f32,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let leaves = parse_list::<f32>(required(weak, "leafValues")?)?;
    Ok(WeakClassifier { nodes, leaves })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One-stump cascade firing on windows whose right half is brighter than the left
    pub(crate) fn edge_cascade() -> HaarCascade {
        let feature = HaarFeature {
            rects: vec![
                WeightedRect { x: 0, y: 0, width: 8, height: 8, weight: -1.0 },
                WeightedRect { x: 4, y: 0, width: 4, height: 8, weight: 2.0 },
            ],
        };
        let stump = WeakClassifier {
            nodes: vec![TreeNode { left: 0, right: -1, feature: 0, threshold: 0.1 }],
            leaves: vec![-1.0, 1.0],
        };
        HaarCascade::new(
            (8, 8),
            vec![feature],
            vec![Stage { threshold: 0.0, classifiers: vec![stump] }],
        )
        .unwrap()
    }

    fn split_image(width: u32, height: u32, edge: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| if x < edge { Luma([20]) } else { Luma([220]) })
    }

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>8</height>
  <width>8</width>
  <stageNum>1</stageNum>
  <stages>
    <!-- stage 0 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000149011612e-01</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 8 8 -1.</_>
        <_>
          4 0 4 8 2.</_></rects></_></features></cascade>
</opencv_storage>
"#;

    #[test]
    fn test_parse_opencv_xml() {
        let cascade = HaarCascade::from_xml(SAMPLE_XML).unwrap();
        assert_eq!(cascade.window(), (8, 8));
        assert_eq!(cascade.stage_count(), 1);
        assert_eq!(cascade.features[0].rects[1].weight, 2.0);
        assert!((cascade.stages[0].classifiers[0].nodes[0].threshold - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_tilted_and_lbp() {
        let tilted = SAMPLE_XML.replace("</rects></_></features>", "</rects><tilted>1</tilted></_></features>");
        assert!(matches!(HaarCascade::from_xml(&tilted), Err(CascadeError::Unsupported(_))));

        let lbp = SAMPLE_XML.replace("<featureType>HAAR</featureType>", "<featureType>LBP</featureType>");
        assert!(matches!(HaarCascade::from_xml(&lbp), Err(CascadeError::Unsupported(_))));
    }

    #[test]
    fn test_parse_rejects_dangling_feature() {
        let bad = SAMPLE_XML.replace("0 -1 0 1.0000000149011612e-01", "0 -1 3 0.1");
        assert!(matches!(HaarCascade::from_xml(&bad), Err(CascadeError::Invalid(_))));
        assert!(matches!(HaarCascade::from_xml("<nope/>"), Err(CascadeError::Format(_))));
        assert!(matches!(HaarCascade::from_xml("<unclosed>"), Err(CascadeError::Xml(_))));
    }

    #[test]
    fn test_parse_rejects_rect_past_u32() {
        let bad = SAMPLE_XML.replace("4 0 4 8 2.", "4294967295 0 2 8 2.");
        assert!(matches!(HaarCascade::from_xml(&bad), Err(CascadeError::Invalid(_))));
    }

    #[test]
    fn test_parse_rejects_saturated_leaf_index() {
        // Saturates to i32::MIN when narrowed
        let bad = SAMPLE_XML.replace("0 -1 0 1.0000000149011612e-01", "-3000000000 -1 0 0.1");
        assert!(matches!(HaarCascade::from_xml(&bad), Err(CascadeError::Invalid(_))));
    }

    #[test]
    fn test_matches_at_far_corner_is_rejected() {
        let cascade = edge_cascade();
        let image = split_image(16, 8, 4);
        assert!(!cascade.matches_at(&image, u32::MAX, 0));
    }

    #[test]
    fn test_evaluate_edge_window() {
        let cascade = edge_cascade();
        let image = split_image(16, 8, 4);
        // Window straddling the dark/bright edge at its centre fires
        assert!(cascade.matches_at(&image, 0, 0));
        // Window fully inside the bright side is flat and is rejected
        assert!(!cascade.matches_at(&image, 8, 0));
        // Out-of-bounds windows never match
        assert!(!cascade.matches_at(&image, 12, 0));
    }

    #[test]
    fn test_evaluate_is_contrast_normalized() {
        let cascade = edge_cascade();
        let faint = GrayImage::from_fn(8, 8, |x, _| if x < 4 { Luma([100]) } else { Luma([104]) });
        assert!(cascade.matches_at(&faint, 0, 0));
    }
}
