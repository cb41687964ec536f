extern crate clap;
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate partslide;
extern crate pbr;

use clap::{App, Arg, ArgMatches};
use partslide::{
    image_handle, layout_from_table, load_table, DiskHandle, GptEntry, GptHeader, Mbr,
    MoveRequest, SlideError, SlidePlan, Slider, Table,
};
use pbr::ProgressBar;
use std::{cell::RefCell, process::exit, rc::Rc};

#[derive(Debug, Fail)]
enum CliError {
    #[fail(display = "argument '{}' is not a number", arg)]
    ArgNaN { arg: String },
    #[fail(display = "partition slot {} was not found on the disk", slot)]
    SlotNotFound { slot: usize },
    #[fail(display = "unable to inspect {}: {}", device, why)]
    Inspect { device: String, why: std::io::Error },
    #[fail(display = "{}", why)]
    Slide { why: SlideError },
}

impl From<SlideError> for CliError {
    fn from(why: SlideError) -> CliError { CliError::Slide { why } }
}

fn main() {
    let matches = App::new("partslide")
        .about("Inspects partition tables and slides partitions to new start sectors")
        .arg(
            Arg::with_name("device")
                .help("block device or disk image to operate on")
                .required(true),
        )
        .arg(
            Arg::with_name("sector-size")
                .long("sector-size")
                .help("logical sector size of the device, in bytes")
                .takes_value(true)
                .default_value("512"),
        )
        .arg(
            Arg::with_name("sectors")
                .long("sectors")
                .help("total sector count; derived from the file length if omitted")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("list")
                .short("l")
                .long("list")
                .help("prints the decoded partition table"),
        )
        .arg(
            Arg::with_name("move")
                .short("m")
                .long("move")
                .help("slides partition SLOT so that its data starts at sector START")
                .takes_value(true)
                .number_of_values(2)
                .value_names(&["SLOT", "START"]),
        )
        .get_matches();

    if let Err(why) = partslide::log(|_level, _message| ()) {
        eprintln!("failed to initialize logging: {}", why);
    }

    if let Err(why) = run(&matches) {
        eprintln!("partslide: {}", why);
        exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), CliError> {
    let device = matches.value_of("device").unwrap();
    let sector_size = parse_number(matches.value_of("sector-size").unwrap())?;

    let handle = match matches.value_of("sectors") {
        Some(sectors) => DiskHandle::new(device, sector_size, parse_number(sectors)?),
        None => image_handle(device, sector_size)
            .map_err(|why| CliError::Inspect { device: device.into(), why })?,
    };

    let table = load_table(&handle)?;

    let moves = matches.values_of("move");
    if matches.is_present("list") || moves.is_none() {
        print_table(&table, &handle);
    }

    if let Some(values) = moves {
        let values: Vec<&str> = values.collect();
        let slot = parse_number(values[0])? as usize;
        let start = parse_number(values[1])?;
        slide(&handle, &table, slot, start)?;
    }

    Ok(())
}

fn slide(handle: &DiskHandle, table: &Table, slot: usize, start: u64) -> Result<(), CliError> {
    let (record, index) = match table {
        Table::Mbr(mbr) => {
            let index = mbr
                .records()
                .iter()
                .position(|record| record.slot == slot)
                .ok_or(CliError::SlotNotFound { slot })?;
            (&mbr.records()[index], index)
        }
        Table::Gpt { .. } => {
            return Err(SlideError::UnsupportedScheme { scheme: table.scheme() }.into());
        }
    };

    // Resolve the request against the other partitions before touching the
    // disk; a colliding request lands at the nearest legal position.
    let mut layout = layout_from_table(table, handle)?;
    layout.select(index);
    let resolved = layout
        .propose_move(MoveRequest::Start(start))
        .map_err(SlideError::from)?;

    if resolved.start != start {
        println!(
            "requested start {} was not available; sliding to {} instead",
            start, resolved.start
        );
    }

    if resolved.start == u64::from(record.start_lba) {
        println!("partition {} already starts at sector {}", slot, resolved.start);
        return Ok(());
    }

    let plan = SlidePlan {
        slot,
        old_start: u64::from(record.start_lba),
        old_end: record.end_lba(),
        new_start: resolved.start,
    };

    let job = Slider::new().start(handle, table, plan)?;

    let pb = Rc::new(RefCell::new(ProgressBar::new(100)));
    pb.borrow_mut().show_speed = false;
    pb.borrow_mut().show_counter = false;
    pb.borrow_mut().message("Sliding partition ");

    let patched = {
        let progress = pb.clone();
        let eta = pb.clone();
        job.drive(
            move |percent| {
                progress.borrow_mut().set(percent as u64);
            },
            move |estimate| {
                eta.borrow_mut().message(&format!("Sliding partition (ETA {}) ", estimate));
            },
        )?
    };

    pb.borrow_mut().finish_println("");
    println!("partition {} now starts at sector {}:", slot, resolved.start);
    print_mbr(&patched, handle);
    Ok(())
}

fn print_table(table: &Table, handle: &DiskHandle) {
    match table {
        Table::Mbr(mbr) => print_mbr(mbr, handle),
        Table::Gpt { header, entries } => print_gpt(header, entries, handle),
    }
}

fn print_mbr(mbr: &Mbr, handle: &DiskHandle) {
    println!(
        "{}: MBR, disk signature {}, boot signature {}",
        handle.path.display(),
        partslide::to_hex(mbr.disk_signature()),
        if mbr.has_boot_signature() { "valid" } else { "missing" },
    );

    for record in mbr.records() {
        println!(
            "  {}: {}{:02X} ({}) start {} sectors {} end {} ({:.2} GiB)",
            record.slot,
            if record.bootable { "boot " } else { "" },
            record.type_code,
            record.type_description(),
            record.start_lba,
            record.sectors,
            record.end_lba(),
            gib(u64::from(record.sectors), handle.sector_size),
        );
    }
}

fn print_gpt(header: &GptHeader, entries: &[GptEntry], handle: &DiskHandle) {
    println!(
        "{}: GPT revision {}.{}, disk {}, usable sectors {}-{}, {} entries of {} bytes",
        handle.path.display(),
        header.revision.0,
        header.revision.1,
        header.disk_guid,
        header.first_usable_lba,
        header.last_usable_lba,
        header.entry_count,
        header.entry_size,
    );

    for entry in entries {
        let mut flags = String::new();
        if entry.is_required() {
            flags.push_str(" required");
        }
        if entry.no_block_io() {
            flags.push_str(" no-block-io");
        }
        if entry.legacy_bios_bootable() {
            flags.push_str(" legacy-boot");
        }

        println!(
            "  {}: '{}' ({}) sectors {}-{} ({:.2} GiB){}",
            entry.index,
            entry.name,
            entry.type_description(),
            entry.first_lba,
            entry.last_lba,
            gib(entry.last_lba - entry.first_lba + 1, handle.sector_size),
            flags,
        );
    }
}

fn gib(sectors: u64, sector_size: u64) -> f64 {
    (sectors * sector_size) as f64 / f64::from(1 << 30)
}

fn parse_number(value: &str) -> Result<u64, CliError> {
    value.parse::<u64>().map_err(|_| CliError::ArgNaN { arg: value.into() })
}
