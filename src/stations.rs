use std::fmt::Write as _;
use std::fs;

use camino::Utf8Path;
use chrono::{SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Serialize;

use crate::error::Gcmt3dError;
use crate::fs_util;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Station {
    pub network: String,
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Channel {
    pub location: String,
    pub code: String,
    pub depth: f64,
}

impl Station {
    pub fn burial(&self) -> f64 {
        self.channels.first().map(|channel| channel.depth).unwrap_or(0.0)
    }
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn merge(&mut self, other: Inventory) {
        for station in other.stations {
            let known = self
                .stations
                .iter()
                .any(|s| s.network == station.network && s.code == station.code);
            if !known {
                self.stations.push(station);
            }
        }
    }

    pub fn parse_station_xml(content: &str, path: &Utf8Path) -> Result<Self, Gcmt3dError> {
        let parse_err = |message: String| Gcmt3dError::StationParse {
            path: path.to_owned(),
            message,
        };

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut inventory = Inventory::default();
        let mut network = String::new();
        let mut stack: Vec<String> = Vec::new();
        let mut text = String::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|err| parse_err(err.to_string()))?;
            match event {
                Event::Start(start) => {
                    let name = local_name(&start);
                    match name.as_str() {
                        "Network" => network = attribute(&start, "code").unwrap_or_default(),
                        "Station" => inventory.stations.push(Station {
                            network: network.clone(),
                            code: attribute(&start, "code").unwrap_or_default(),
                            ..Station::default()
                        }),
                        "Channel" => {
                            if let Some(station) = inventory.stations.last_mut() {
                                station.channels.push(Channel {
                                    location: attribute(&start, "locationCode")
                                        .unwrap_or_default(),
                                    code: attribute(&start, "code").unwrap_or_default(),
                                    depth: 0.0,
                                });
                            }
                        }
                        _ => {}
                    }
                    stack.push(name);
                    text.clear();
                }
                Event::Text(value) => {
                    let value = value.unescape().map_err(|err| parse_err(err.to_string()))?;
                    text.push_str(&value);
                }
                Event::End(_) => {
                    let Some(name) = stack.pop() else {
                        return Err(parse_err("unbalanced end tag".to_string()));
                    };
                    let parent = stack.last().map(String::as_str);
                    let number = || -> Result<f64, Gcmt3dError> {
                        text.trim()
                            .parse()
                            .map_err(|_| parse_err(format!("invalid <{name}> value {text:?}")))
                    };
                    match (parent, name.as_str()) {
                        (Some("Station"), "Latitude") => {
                            last_station(&mut inventory, path)?.latitude = number()?;
                        }
                        (Some("Station"), "Longitude") => {
                            last_station(&mut inventory, path)?.longitude = number()?;
                        }
                        (Some("Station"), "Elevation") => {
                            last_station(&mut inventory, path)?.elevation = number()?;
                        }
                        (Some("Channel"), "Depth") => {
                            let depth = number()?;
                            let station = last_station(&mut inventory, path)?;
                            if let Some(channel) = station.channels.last_mut() {
                                channel.depth = depth;
                            }
                        }
                        _ => {}
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(inventory)
    }

    pub fn read_station_xml(path: &Utf8Path) -> Result<Self, Gcmt3dError> {
        let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
            Gcmt3dError::StationParse {
                path: path.to_owned(),
                message: err.to_string(),
            }
        })?;
        Self::parse_station_xml(&content, path)
    }

    pub fn from_dir(dir: &Utf8Path) -> Result<Self, Gcmt3dError> {
        if !dir.as_std_path().is_dir() {
            return Err(Gcmt3dError::NoStations(dir.to_owned()));
        }
        let files = fs_util::list_files_with_ext(dir, "xml")?;
        if files.is_empty() {
            return Err(Gcmt3dError::NoStations(dir.to_owned()));
        }
        let mut inventory = Inventory::default();
        for file in files {
            inventory.merge(Self::read_station_xml(&file)?);
        }
        Ok(inventory)
    }

    pub fn to_station_xml(&self) -> Result<String, Gcmt3dError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        emit(
            &mut writer,
            Event::Start(BytesStart::new("FDSNStationXML").with_attributes([
                ("xmlns", "http://www.fdsn.org/xml/station/1"),
                ("schemaVersion", "1.1"),
            ])),
        )?;
        write_text_element(&mut writer, "Source", "gcmt3d")?;
        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        write_text_element(&mut writer, "Created", &created)?;

        let mut networks: Vec<&str> = Vec::new();
        for station in &self.stations {
            if !networks.contains(&station.network.as_str()) {
                networks.push(&station.network);
            }
        }

        for network in networks {
            emit(
                &mut writer,
                Event::Start(BytesStart::new("Network").with_attributes([("code", network)])),
            )?;
            for station in self.stations.iter().filter(|s| s.network == network) {
                write_station(&mut writer, station)?;
            }
            emit(&mut writer, Event::End(BytesEnd::new("Network")))?;
        }

        emit(&mut writer, Event::End(BytesEnd::new("FDSNStationXML")))?;
        String::from_utf8(writer.into_inner())
            .map_err(|err| Gcmt3dError::Filesystem(err.to_string()))
    }

    pub fn to_station_listing(&self) -> String {
        let mut out = String::new();
        for station in &self.stations {
            let _ = writeln!(
                out,
                "{:>5} {:>2} {:>10.4} {:>10.4} {:>8.1} {:>6.1}",
                station.code,
                station.network,
                station.latitude,
                station.longitude,
                station.elevation,
                station.burial()
            );
        }
        out
    }

    pub fn write_station_xml(&self, path: &Utf8Path) -> Result<(), Gcmt3dError> {
        fs_util::write_bytes_atomic(path, self.to_station_xml()?.as_bytes())
    }

    pub fn write_station_listing(&self, path: &Utf8Path) -> Result<(), Gcmt3dError> {
        fs_util::write_bytes_atomic(path, self.to_station_listing().as_bytes())
    }
}

fn last_station<'a>(
    inventory: &'a mut Inventory,
    path: &Utf8Path,
) -> Result<&'a mut Station, Gcmt3dError> {
    inventory
        .stations
        .last_mut()
        .ok_or_else(|| Gcmt3dError::StationParse {
            path: path.to_owned(),
            message: "station value outside <Station>".to_string(),
        })
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), Gcmt3dError> {
    writer
        .write_event(event)
        .map_err(|err| Gcmt3dError::Filesystem(format!("station xml: {err}")))
}

fn write_station(writer: &mut Writer<Vec<u8>>, station: &Station) -> Result<(), Gcmt3dError> {
    emit(
        writer,
        Event::Start(BytesStart::new("Station").with_attributes([("code", station.code.as_str())])),
    )?;
    write_text_element(writer, "Latitude", &station.latitude.to_string())?;
    write_text_element(writer, "Longitude", &station.longitude.to_string())?;
    write_text_element(writer, "Elevation", &station.elevation.to_string())?;
    for channel in &station.channels {
        emit(
            writer,
            Event::Start(BytesStart::new("Channel").with_attributes([
                ("code", channel.code.as_str()),
                ("locationCode", channel.location.as_str()),
            ])),
        )?;
        write_text_element(writer, "Latitude", &station.latitude.to_string())?;
        write_text_element(writer, "Longitude", &station.longitude.to_string())?;
        write_text_element(writer, "Elevation", &station.elevation.to_string())?;
        write_text_element(writer, "Depth", &channel.depth.to_string())?;
        emit(writer, Event::End(BytesEnd::new("Channel")))?;
    }
    emit(writer, Event::End(BytesEnd::new("Station")))
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &str,
) -> Result<(), Gcmt3dError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart<'_>, key: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key.as_bytes())
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANMO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FDSNStationXML xmlns="http://www.fdsn.org/xml/station/1" schemaVersion="1.1">
  <Source>IRIS-DMC</Source>
  <Network code="IU">
    <Station code="ANMO">
      <Latitude>34.9459</Latitude>
      <Longitude>-106.4572</Longitude>
      <Elevation>1850.0</Elevation>
      <Channel code="BHZ" locationCode="00">
        <Latitude>34.9459</Latitude>
        <Longitude>-106.4572</Longitude>
        <Elevation>1850.0</Elevation>
        <Depth>100.0</Depth>
      </Channel>
    </Station>
  </Network>
</FDSNStationXML>
"#;

    #[test]
    fn parse_station_values_not_channel_values() {
        let inventory = Inventory::parse_station_xml(ANMO, Utf8Path::new("IU.ANMO.xml")).unwrap();
        assert_eq!(inventory.len(), 1);
        let station = &inventory.stations[0];
        assert_eq!((station.network.as_str(), station.code.as_str()), ("IU", "ANMO"));
        assert_eq!(station.latitude, 34.9459);
        assert_eq!(station.elevation, 1850.0);
        assert_eq!(station.burial(), 100.0);
        assert_eq!(station.channels[0].location, "00");
    }

    #[test]
    fn written_xml_parses_back() {
        let inventory = Inventory::parse_station_xml(ANMO, Utf8Path::new("IU.ANMO.xml")).unwrap();
        let xml = inventory.to_station_xml().unwrap();
        let again = Inventory::parse_station_xml(&xml, Utf8Path::new("stations.xml")).unwrap();
        assert_eq!(again, inventory);
    }

    #[test]
    fn listing_line_format() {
        let inventory = Inventory::parse_station_xml(ANMO, Utf8Path::new("IU.ANMO.xml")).unwrap();
        assert_eq!(
            inventory.to_station_listing(),
            " ANMO IU    34.9459  -106.4572   1850.0  100.0\n"
        );
    }

    #[test]
    fn merge_keeps_first_occurrence() {
        let mut first = Inventory::parse_station_xml(ANMO, Utf8Path::new("a.xml")).unwrap();
        let mut second = first.clone();
        second.stations[0].latitude = 0.0;
        first.merge(second);
        assert_eq!(first.len(), 1);
        assert_eq!(first.stations[0].latitude, 34.9459);
    }
}
