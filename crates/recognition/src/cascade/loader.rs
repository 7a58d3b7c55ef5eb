use std::path::Path;

use roxmltree::{Document, Node};
use tracing::debug;

use super::model::{CascadeModel, DecisionNode, HaarFeature, Stage, WeakClassifier, WeightedRect};
use crate::error::{RecognitionError, Result};

/// Stage thresholds read from XML are lowered by this amount.
const THRESHOLD_EPS: f32 = 1e-5;

type ParseResult<T> = std::result::Result<T, String>;

/// Load and validate a cascade model, dispatching on the file extension.
pub fn load_model(path: &Path) -> Result<CascadeModel> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let parse: fn(&str) -> ParseResult<CascadeModel> = match extension.as_deref() {
        Some("xml") => parse_xml,
        Some("json") => parse_json,
        _ => return Err(RecognitionError::model_load(path, "unsupported model format")),
    };

    let text = std::fs::read_to_string(path).map_err(|e| RecognitionError::model_load(path, e))?;
    let model = parse(&text).map_err(|reason| RecognitionError::model_load(path, reason))?;
    model
        .validate()
        .map_err(|reason| RecognitionError::model_load(path, reason))?;

    debug!(
        path = %path.display(),
        stages = model.stages.len(),
        classifiers = model.classifier_count(),
        features = model.features.len(),
        "Loaded cascade model"
    );

    Ok(model)
}

pub fn parse_json(text: &str) -> ParseResult<CascadeModel> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

/// Parse OpenCV cascade storage in either the current or the legacy layout.
pub fn parse_xml(text: &str) -> ParseResult<CascadeModel> {
    let doc = Document::parse(text).map_err(|e| e.to_string())?;
    let root = doc.root_element();

    let cascade = elements(root)
        .next()
        .ok_or_else(|| "no cascade element under the storage root".to_string())?;

    if child(cascade, "stageType").is_some() || child(cascade, "featureType").is_some() {
        parse_current(cascade)
    } else if child(cascade, "size").is_some() {
        parse_legacy(cascade)
    } else {
        Err(format!("unrecognized cascade layout <{}>", cascade.tag_name().name()))
    }
}

fn parse_current(cascade: Node) -> ParseResult<CascadeModel> {
    let stage_type = text_of(required(cascade, "stageType")?);
    if stage_type != "BOOST" {
        return Err(format!("unsupported stage type {stage_type}"));
    }
    let feature_type = text_of(required(cascade, "featureType")?);
    if feature_type != "HAAR" {
        return Err(format!("unsupported feature type {feature_type}"));
    }

    let window_width = parse_number(required(cascade, "width")?)?;
    let window_height = parse_number(required(cascade, "height")?)?;

    let mut stages = Vec::new();
    for stage_node in items(required(cascade, "stages")?) {
        let threshold: f32 = parse_number(required(stage_node, "stageThreshold")?)?;
        let mut classifiers = Vec::new();
        for weak in items(required(stage_node, "weakClassifiers")?) {
            classifiers.push(parse_current_classifier(weak)?);
        }
        stages.push(Stage {
            threshold: threshold - THRESHOLD_EPS,
            classifiers,
        });
    }

    let mut features = Vec::new();
    for feature_node in items(required(cascade, "features")?) {
        let tilted = match child(feature_node, "tilted") {
            Some(node) => parse_number::<i32>(node)? != 0,
            None => false,
        };
        features.push(HaarFeature {
            rects: parse_rects(required(feature_node, "rects")?)?,
            tilted,
        });
    }

    Ok(CascadeModel {
        window_width,
        window_height,
        stages,
        features,
    })
}

/// `internalNodes` holds groups of `left right feature threshold`.
fn parse_current_classifier(weak: Node) -> ParseResult<WeakClassifier> {
    let raw = numbers::<f64>(required(weak, "internalNodes")?)?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(format!("internalNodes has {} values, expected groups of 4", raw.len()));
    }

    let nodes = raw
        .chunks_exact(4)
        .map(|group| {
            if group[2] < 0.0 {
                return Err(format!("negative feature index {}", group[2]));
            }
            Ok(DecisionNode {
                left: group[0] as i32,
                right: group[1] as i32,
                feature: group[2] as usize,
                threshold: group[3] as f32,
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(WeakClassifier {
        nodes,
        leaves: numbers(required(weak, "leafValues")?)?,
    })
}

fn parse_legacy(cascade: Node) -> ParseResult<CascadeModel> {
    let size = numbers::<u32>(required(cascade, "size")?)?;
    let [window_width, window_height] = size[..] else {
        return Err(format!("size must hold two values, got {}", size.len()));
    };

    let mut stages = Vec::new();
    let mut features = Vec::new();
    for stage_node in items(required(cascade, "stages")?) {
        let threshold: f32 = parse_number(required(stage_node, "stage_threshold")?)?;
        let mut classifiers = Vec::new();
        for tree in items(required(stage_node, "trees")?) {
            classifiers.push(parse_legacy_tree(tree, &mut features)?);
        }
        stages.push(Stage {
            threshold: threshold - THRESHOLD_EPS,
            classifiers,
        });
    }

    Ok(CascadeModel {
        window_width,
        window_height,
        stages,
        features,
    })
}

/// Legacy trees carry their features inline and name leaves with
/// `left_val`/`right_val` or children with `left_node`/`right_node`.
fn parse_legacy_tree(tree: Node, features: &mut Vec<HaarFeature>) -> ParseResult<WeakClassifier> {
    let mut nodes = Vec::new();
    let mut leaves: Vec<f32> = Vec::new();

    for node in items(tree) {
        let feature_node = required(node, "feature")?;
        let tilted = match child(feature_node, "tilted") {
            Some(t) => parse_number::<i32>(t)? != 0,
            None => false,
        };
        features.push(HaarFeature {
            rects: parse_rects(required(feature_node, "rects")?)?,
            tilted,
        });

        let mut branch = |val: &str, next: &str| -> ParseResult<i32> {
            if let Some(leaf) = child(node, val) {
                leaves.push(parse_number(leaf)?);
                Ok(-(leaves.len() as i32 - 1))
            } else if let Some(idx) = child(node, next) {
                parse_number(idx)
            } else {
                Err(format!("tree node has neither {val} nor {next}"))
            }
        };
        let left = branch("left_val", "left_node")?;
        let right = branch("right_val", "right_node")?;

        nodes.push(DecisionNode {
            feature: features.len() - 1,
            threshold: parse_number(required(node, "threshold")?)?,
            left,
            right,
        });
    }

    Ok(WeakClassifier { nodes, leaves })
}

/// Rect entries read `x y width height weight`.
fn parse_rects(rects: Node) -> ParseResult<Vec<WeightedRect>> {
    items(rects)
        .map(|item| {
            let values = numbers::<f64>(item)?;
            let [x, y, width, height, weight] = values[..] else {
                return Err(format!("rect must hold 5 values, got {}", values.len()));
            };
            if x < 0.0 || y < 0.0 || width < 0.0 || height < 0.0 {
                return Err(format!("negative rect geometry {x} {y} {width} {height}"));
            }
            Ok(WeightedRect {
                x: x as u32,
                y: y as u32,
                width: width as u32,
                height: height as u32,
                weight: weight as f32,
            })
        })
        .collect()
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|c| c.is_element())
}

fn items<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    elements(node).filter(|c| c.has_tag_name("_"))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|c| c.has_tag_name(name))
}

fn required<'a, 'input>(node: Node<'a, 'input>, name: &str) -> ParseResult<Node<'a, 'input>> {
    child(node, name).ok_or_else(|| format!("missing <{name}> in <{}>", node.tag_name().name()))
}

/// All text below `node` with comments skipped.
fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn numbers<T: std::str::FromStr>(node: Node) -> ParseResult<Vec<T>> {
    text_of(node)
        .split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|_| format!("invalid number {token:?} in <{}>", node.tag_name().name()))
        })
        .collect()
}

fn parse_number<T: std::str::FromStr>(node: Node) -> ParseResult<T> {
    let text = text_of(node);
    text.parse()
        .map_err(|_| format!("invalid number {text:?} in <{}>", node.tag_name().name()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CURRENT_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stageNum>1</stageNum>
  <stages>
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
          0 0 20 20 -1.</_>
        <_>
          5 5 10 10 2.</_></rects></_></features></cascade>
</opencv_storage>
"#;

    const LEGACY_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<haarcascade_test type_id="opencv-haar-classifier">
  <size>20 20</size>
  <stages>
    <_>
      <!-- stage 0 -->
      <trees>
        <_>
          <!-- tree 0 -->
          <_>
            <!-- root node -->
            <feature>
              <rects>
                <_>0 0 20 20 -1.</_>
                <_>5 5 10 10 2.</_></rects>
              <tilted>0</tilted></feature>
            <threshold>0.1</threshold>
            <left_val>-1.</left_val>
            <right_val>1.</right_val></_></_></trees>
      <stage_threshold>0.</stage_threshold>
      <parent>-1</parent>
      <next>-1</next></_></stages></haarcascade_test>
</opencv_storage>
"#;

    #[test]
    fn current_layout_parses() {
        let model = parse_xml(CURRENT_XML).unwrap();
        assert_eq!(model.window(), (20, 20));
        assert_eq!(model.stages.len(), 1);
        assert_eq!(model.stages[0].threshold, -THRESHOLD_EPS);
        let node = model.stages[0].classifiers[0].nodes[0];
        assert_eq!((node.left, node.right, node.feature), (0, -1, 0));
        assert_eq!(model.stages[0].classifiers[0].leaves, vec![-1.0, 1.0]);
        assert_eq!(model.features[0].rects[1].weight, 2.0);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn legacy_and_current_layouts_agree() {
        let current = parse_xml(CURRENT_XML).unwrap();
        let legacy = parse_xml(LEGACY_XML).unwrap();
        assert_eq!(legacy.window(), current.window());
        assert_eq!(legacy.features, current.features);
        assert_eq!(legacy.stages[0].classifiers[0].leaves, current.stages[0].classifiers[0].leaves);
        let node = legacy.stages[0].classifiers[0].nodes[0];
        assert_eq!((node.left, node.right, node.feature), (0, -1, 0));
    }

    #[test]
    fn lbp_cascades_are_rejected() {
        let lbp = CURRENT_XML.replace("<featureType>HAAR", "<featureType>LBP");
        assert!(parse_xml(&lbp).unwrap_err().contains("LBP"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_xml("<opencv_storage><cascade>").is_err());
        assert!(parse_xml("<opencv_storage><cascade><other/></cascade></opencv_storage>").is_err());
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let xml_path = dir.path().join("model.xml");
        std::fs::write(&xml_path, CURRENT_XML).unwrap();
        let from_xml = load_model(&xml_path).unwrap();

        let json_path = dir.path().join("model.json");
        std::fs::write(&json_path, serde_json::to_string(&from_xml).unwrap()).unwrap();
        assert_eq!(load_model(&json_path).unwrap(), from_xml);

        let other = dir.path().join("model.yaml");
        std::fs::write(&other, "stages: []").unwrap();
        let err = load_model(&other).unwrap_err();
        assert!(matches!(err, RecognitionError::ModelLoad { .. }));
    }

    #[test]
    fn missing_file_is_a_model_load_error() {
        let err = load_model(Path::new("does/not/exist.xml")).unwrap_err();
        match err {
            RecognitionError::ModelLoad { path, .. } => assert_eq!(path, Path::new("does/not/exist.xml")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_structure_fails_validation_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xml");
        std::fs::write(&path, CURRENT_XML.replace("5 5 10 10 2.", "15 5 10 10 2.")).unwrap();
        assert!(matches!(load_model(&path), Err(RecognitionError::ModelLoad { .. })));
    }
}
