#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use civic_etl::config::{DatasetConfig, DateTableConfig, PipelineConfig};
use tempfile::{TempDir, tempdir};

/// Miniature cut of the LA County COVID feed, raw column order included.
pub const COVID_CSV: &str = "\
date,county,state,fips,cases,deaths,state_cases,state_deaths,new_cases,new_deaths,new_state_cases,new_state_deaths,people_tested,Lat,Lon
03/01/2020 12:00:00 AM,Los Angeles,CA,6037,20,1,40,2,5,0,6,1,,34.05,-118.24
03/02/2020 12:00:00 AM,Los Angeles,CA,6037,25,1,50,2,-5,0,10,1,,34.05,-118.24
03/03/2020 12:00:00 AM,Los Angeles,CA,6037,30,2,60,3,5,1,10,1,,34.05,-118.24
";

/// Miniature cut of the LAPD crime feed. Row one has no weapon and no cross
/// street; row two carries an unmapped descent code.
pub const CRIME_CSV: &str = "\
DR_NO,Date Rptd,DATE OCC,TIME OCC,AREA,AREA NAME,Rpt Dist No,Part 1-2,Crm Cd,Crm Cd Desc,Mocodes,Vict Age,Vict Sex,Vict Descent,Premis Cd,Premis Desc,Weapon Used Cd,Weapon Desc,Status,Status Desc,Crm Cd 1,Crm Cd 2,Crm Cd 3,Crm Cd 4,LOCATION,Cross Street,LAT,LON
190326475,03/01/2020 12:00:00 AM,03/01/2020 12:00:00 AM,2130,7,Wilshire,784,1,510,VEHICLE - STOLEN,0344,30,F,W,101,STREET,,,AA,Adult Arrest,510,,,,1900 S LONGWOOD AV,,34.0375,-118.3506
190101086,03/02/2020 12:00:00 AM,03/02/2020 12:00:00 AM,1800,1,Central,182,1,330,BURGLARY FROM VEHICLE,1822 1402,47,M,Q,128,BUS STOP,400,STRONG-ARM,IC,Invest Cont,330,,,,1000 S FLOWER ST,OLYMPIC BL,34.0444,-118.2628
190412301,03/03/2020 12:00:00 AM,03/03/2020 12:00:00 AM,0930,4,Hollenbeck,413,2,624,BATTERY - SIMPLE ASSAULT,0416,25,X,H,502,APARTMENT,500,UNKNOWN WEAPON,IC,Invest Cont,624,,,,2100 E 1ST ST,SOTO ST,34.0412,-118.2097
";

/// Scratch directory holding fixture CSVs, the pipeline config, and the
/// target database for one test case. Cleans up on drop.
pub struct EtlWorkspace {
    temp_dir: TempDir,
}

impl EtlWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create fixture file");
        file.write_all(contents.as_bytes())
            .expect("write fixture contents");
        path
    }

    /// Writes both civic fixtures and returns a config wired to them, with
    /// the store under this workspace.
    pub fn fixture_config(&self) -> PipelineConfig {
        let covid = self.write("covid.csv", COVID_CSV);
        let crime = self.write("crime.csv", CRIME_CSV);
        PipelineConfig {
            datasets: vec![
                dataset("covid", &covid, "covid_data"),
                dataset("crime", &crime, "crime_data"),
            ],
            date_table: DateTableConfig {
                start: date(2020, 1, 1),
                end: date(2020, 1, 10),
                target_table: "Calender_data".to_string(),
            },
            target_db_path: self.path().join("data"),
            target_db_name: "city-test".to_string(),
        }
    }

    pub fn db_path(&self, config: &PipelineConfig) -> PathBuf {
        config.db_path()
    }
}

pub fn dataset(name: &str, source: &Path, target_table: &str) -> DatasetConfig {
    DatasetConfig {
        name: name.to_string(),
        source: source.to_str().expect("utf-8 fixture path").to_string(),
        delimiter: ",".to_string(),
        target_table: target_table.to_string(),
        archive_member: None,
        recipe: None,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
