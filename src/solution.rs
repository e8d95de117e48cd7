use std::fmt::Write as _;
use std::fs;

use camino::Utf8Path;

use crate::domain::EventName;
use crate::error::Gcmt3dError;
use crate::fs_util;

pub trait SourceSolution {
    fn event_name(&self) -> &EventName;
    fn moment_magnitude(&self) -> f64;
    fn depth_in_m(&self) -> f64;
    fn attribute(&self, name: &str) -> Option<f64>;
    fn render(&self) -> String;
}

pub trait SolutionReader: Send + Sync {
    type Solution: SourceSolution;

    fn read(&self, path: &Utf8Path) -> Result<Self::Solution, Gcmt3dError>;
}

pub fn write_solution<S: SourceSolution + ?Sized>(
    solution: &S,
    path: &Utf8Path,
) -> Result<(), Gcmt3dError> {
    fs_util::write_bytes_atomic(path, solution.render().as_bytes())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CmtSolution {
    pub header: String,
    pub event_name: EventName,
    pub time_shift: f64,
    pub half_duration: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub m_rr: f64,
    pub m_tt: f64,
    pub m_pp: f64,
    pub m_rt: f64,
    pub m_rp: f64,
    pub m_tp: f64,
}

impl CmtSolution {
    pub fn parse(content: &str, path: &Utf8Path) -> Result<Self, Gcmt3dError> {
        let parse_err = |message: String| Gcmt3dError::SolutionParse {
            path: path.to_owned(),
            message,
        };

        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| parse_err("empty file".to_string()))?
            .to_string();

        let mut fields = std::collections::HashMap::new();
        for line in lines {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| parse_err(format!("expected `key: value`, got {line:?}")))?;
            fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let text = |key: &str| {
            fields
                .get(key)
                .cloned()
                .ok_or_else(|| parse_err(format!("missing field `{key}`")))
        };
        let number = |key: &str| -> Result<f64, Gcmt3dError> {
            let raw = text(key)?;
            raw.parse::<f64>()
                .map_err(|err| parse_err(format!("field `{key}` = {raw:?}: {err}")))
        };

        Ok(Self {
            header,
            event_name: text("event name")?.parse()?,
            time_shift: number("time shift")?,
            half_duration: number("half duration")?,
            latitude: number("latitude")?,
            longitude: number("longitude")?,
            depth_km: number("depth")?,
            m_rr: number("mrr")?,
            m_tt: number("mtt")?,
            m_pp: number("mpp")?,
            m_rt: number("mrt")?,
            m_rp: number("mrp")?,
            m_tp: number("mtp")?,
        })
    }

    pub fn scalar_moment(&self) -> f64 {
        let diagonal = self.m_rr.powi(2) + self.m_tt.powi(2) + self.m_pp.powi(2);
        let off_diagonal = self.m_rt.powi(2) + self.m_rp.powi(2) + self.m_tp.powi(2);
        ((diagonal + 2.0 * off_diagonal) / 2.0).sqrt()
    }
}

impl SourceSolution for CmtSolution {
    fn event_name(&self) -> &EventName {
        &self.event_name
    }

    fn moment_magnitude(&self) -> f64 {
        2.0 / 3.0 * (self.scalar_moment().log10() - 16.1)
    }

    fn depth_in_m(&self) -> f64 {
        self.depth_km * 1000.0
    }

    fn attribute(&self, name: &str) -> Option<f64> {
        let value = match name {
            "time_shift" => self.time_shift,
            "half_duration" => self.half_duration,
            "latitude" => self.latitude,
            "longitude" => self.longitude,
            "depth" | "depth_in_m" => self.depth_in_m(),
            "depth_in_km" => self.depth_km,
            "m_rr" => self.m_rr,
            "m_tt" => self.m_tt,
            "m_pp" => self.m_pp,
            "m_rt" => self.m_rt,
            "m_rp" => self.m_rp,
            "m_tp" => self.m_tp,
            "m0" | "M0" => self.scalar_moment(),
            "Mw" | "moment_magnitude" => self.moment_magnitude(),
            _ => return None,
        };
        Some(value)
    }

    // Values use the shortest representation that parses back exactly.
    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.header);
        let _ = writeln!(out, "event name:     {}", self.event_name);
        let _ = writeln!(out, "time shift:     {}", self.time_shift);
        let _ = writeln!(out, "half duration:  {}", self.half_duration);
        let _ = writeln!(out, "latitude:       {}", self.latitude);
        let _ = writeln!(out, "longitude:      {}", self.longitude);
        let _ = writeln!(out, "depth:          {}", self.depth_km);
        let _ = writeln!(out, "Mrr:            {:e}", self.m_rr);
        let _ = writeln!(out, "Mtt:            {:e}", self.m_tt);
        let _ = writeln!(out, "Mpp:            {:e}", self.m_pp);
        let _ = writeln!(out, "Mrt:            {:e}", self.m_rt);
        let _ = writeln!(out, "Mrp:            {:e}", self.m_rp);
        let _ = writeln!(out, "Mtp:            {:e}", self.m_tp);
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CmtSolutionReader;

impl SolutionReader for CmtSolutionReader {
    type Solution = CmtSolution;

    fn read(&self, path: &Utf8Path) -> Result<CmtSolution, Gcmt3dError> {
        let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
            Gcmt3dError::SolutionParse {
                path: path.to_owned(),
                message: err.to_string(),
            }
        })?;
        CmtSolution::parse(&content, path)
    }
}
