//! JSON interchange format. Input floorplans are read as [FloorplanSpec]; legalized floorplans
//! are written straight from a [Floorplan].

use anyhow::{anyhow, Context, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use super::{Floorplan, Region, RegionId, RegionKind};
use crate::geometry::{Area, Rect};
use crate::polygon::RectSet;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FloorplanSpec {
    pub chip: Rect,
    pub regions: Vec<RegionSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    pub kind: RegionKind,
    /// Defaults to the area of `rects` for fixed regions, and is required for soft ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_area: Option<Area>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_min: Option<f64>,
    /// Initial placement. Rectangles of different regions may overlap.
    pub rects: Vec<Rect>,
}

impl FloorplanSpec {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Parsing floorplan JSON")
    }
}

impl Floorplan {
    /// Build a floorplan from its interchange form. Soft regions get the lower ids regardless of
    /// their order in the input.
    pub fn from_spec(spec: &FloorplanSpec) -> Result<Self> {
        let mut fp = Floorplan::new(spec.chip);
        let ordered = spec
            .regions
            .iter()
            .filter(|r| r.kind == RegionKind::Soft)
            .chain(spec.regions.iter().filter(|r| r.kind == RegionKind::Fixed));

        let mut placed: Vec<(RegionId, &RegionSpec)> = Vec::with_capacity(spec.regions.len());
        for r in ordered {
            if fp.find_region(&r.name).is_some() {
                return Err(anyhow!("Duplicate region name {:?}", r.name));
            }
            let legal_area = match (r.kind, r.legal_area) {
                (_, Some(a)) => a,
                (RegionKind::Fixed, None) => r.rects.iter().copied().collect::<RectSet>().area(),
                (RegionKind::Soft, None) => {
                    return Err(anyhow!("Soft region {:?} has no legal_area", r.name))
                }
            };
            let mut region = match r.kind {
                RegionKind::Soft => Region::soft(r.name.clone(), legal_area),
                RegionKind::Fixed => Region::fixed(r.name.clone(), legal_area),
            };
            if r.aspect_ratio_min.is_some() || r.aspect_ratio_max.is_some() {
                let min = r.aspect_ratio_min.unwrap_or(region.aspect_ratio_min);
                let max = r.aspect_ratio_max.unwrap_or(region.aspect_ratio_max);
                region = region.with_aspect_ratio(min, max);
            }
            if let Some(u) = r.utilization_min {
                region = region.with_utilization(u);
            }
            placed.push((fp.add_region(region)?, r));
        }

        for (id, r) in placed {
            for rect in r.rects.iter() {
                fp.paint_region(id, *rect)
                    .with_context(|| anyhow!("Placing region {:?}", r.name))?;
            }
        }

        log::info!(
            "Loaded floorplan: {} soft, {} fixed, {} tiles, overlap area {}",
            fp.soft_count(),
            fp.fixed_count(),
            fp.plane().len(),
            fp.total_overlap_area()
        );
        Ok(fp)
    }
}

impl Serialize for Floorplan {
    fn serialize<S>(&self, s: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        let mut map = s.serialize_map(Some(3))?;
        map.serialize_entry("chip", &self.chip())?;
        map.serialize_entry("overlap_area", &self.total_overlap_area())?;
        map.serialize_entry("regions", &RegionListSynth(self))?;
        map.end()
    }
}

/// Serializes every region of the floorplan along with its measured area and failed predicates
struct RegionListSynth<'a>(&'a Floorplan);

impl<'a> Serialize for RegionListSynth<'a> {
    fn serialize<S>(&self, s: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        let fp = self.0;
        let mut seq = s.serialize_seq(Some(fp.regions.len()))?;
        for id in fp.region_ids() {
            seq.serialize_element(&RegionSynth(fp, id))?;
        }
        seq.end()
    }
}

struct RegionSynth<'a>(&'a Floorplan, RegionId);

impl<'a> Serialize for RegionSynth<'a> {
    fn serialize<S>(&self, s: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        let (fp, id) = (self.0, self.1);
        let region = fp.region(id);
        let shape = fp.shape(id);
        let mut map = s.serialize_map(Some(6))?;
        map.serialize_entry("name", &region.name)?;
        map.serialize_entry("kind", &region.kind)?;
        map.serialize_entry("legal_area", &region.legal_area)?;
        map.serialize_entry("area", &shape.area())?;
        map.serialize_entry("rects", &shape.dice())?;
        map.serialize_entry("violations", &fp.violations(id))?;
        map.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = r#"{
        "chip": { "xl": 0, "yl": 0, "xh": 10, "yh": 10 },
        "regions": [
            { "name": "io", "kind": "fixed", "rects": [ { "xl": 0, "yl": 0, "xh": 2, "yh": 2 } ] },
            { "name": "cpu", "kind": "soft", "legal_area": 16,
              "rects": [ { "xl": 1, "yl": 1, "xh": 5, "yh": 5 } ] }
        ]
    }"#;

    #[test]
    fn soft_regions_are_numbered_first() {
        let spec = FloorplanSpec::from_json(SAMPLE).unwrap();
        let fp = Floorplan::from_spec(&spec).unwrap();
        assert_eq!(fp.find_region("cpu"), Some(RegionId(0)));
        assert_eq!(fp.find_region("io"), Some(RegionId(1)));
        assert_eq!(fp.region(RegionId(1)).legal_area, 4);
        assert_eq!(fp.total_overlap_area(), 1);
        fp.check_consistency().unwrap();
    }

    #[test]
    fn output_lists_violations() {
        let spec = FloorplanSpec::from_json(SAMPLE).unwrap();
        let fp = Floorplan::from_spec(&spec).unwrap();
        let out = serde_json::to_value(&fp).unwrap();
        assert_eq!(out["overlap_area"], 1);
        assert_eq!(out["regions"][0]["name"], "cpu");
        assert_eq!(out["regions"][0]["area"], 16);
        assert_eq!(out["regions"][0]["violations"], serde_json::json!([]));
    }

    #[test]
    fn optional_bounds_override_defaults() {
        let spec = FloorplanSpec::from_json(
            r#"{ "chip": { "xl": 0, "yl": 0, "xh": 8, "yh": 8 },
                 "regions": [
                   { "name": "a", "kind": "soft", "legal_area": 4, "aspect_ratio_max": 4.0,
                     "rects": [ { "xl": 0, "yl": 0, "xh": 4, "yh": 1 } ] },
                   { "name": "b", "kind": "soft", "legal_area": 4, "utilization_min": 0.5,
                     "rects": [ { "xl": 0, "yl": 2, "xh": 2, "yh": 4 } ] } ] }"#,
        )
        .unwrap();
        let fp = Floorplan::from_spec(&spec).unwrap();
        let a = fp.region(RegionId(0));
        assert_eq!((a.aspect_ratio_min, a.aspect_ratio_max), (0.5, 4.0));
        assert_eq!(a.utilization_min, 0.8);
        let b = fp.region(RegionId(1));
        assert_eq!((b.aspect_ratio_min, b.aspect_ratio_max), (0.5, 2.0));
        assert_eq!(b.utilization_min, 0.5);
        assert!(fp.is_legal(RegionId(0)));
    }

    #[test]
    fn soft_region_needs_legal_area() {
        let spec = FloorplanSpec::from_json(
            r#"{ "chip": { "xl": 0, "yl": 0, "xh": 4, "yh": 4 },
                 "regions": [ { "name": "a", "kind": "soft", "rects": [] } ] }"#,
        )
        .unwrap();
        assert!(Floorplan::from_spec(&spec).is_err());
    }
}
