//! Patch a few configuration fields in the flash domain of a NAND dump, then
//! extract the whole flash domain without spare bytes.
//!
//! Usage: `cargo run --example patch -- <image> <flash-out>`

use std::{env, fs, process::ExitCode};

use log::{error, info, LevelFilter};
use nandimg::{error::Error, image::NandImage, Whence};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

fn patch(image_path: &str, out_path: &str) -> Result<(), Error> {
    let mut image = NandImage::open(image_path)?.into_flash_addressed();
    info!(
        "{}: {} pages, {:#X} flash bytes",
        image_path,
        image.num_pages(),
        image.flash_size()
    );

    // magic
    image.seek(0x80, Whence::Set)?;
    image.write(&0xCA4Au16.to_be_bytes())?;

    // data offset, data size and enabled flag
    image.seek(0x88, Whence::Set)?;
    for field in [16u32, 72, 1] {
        image.write(&field.to_be_bytes())?;
    }

    // target MAC, host port and host address follow each other
    image.seek(0x98, Whence::Set)?;
    image.write(&[0x00, 0x22, 0x48, 0x5B, 0x4E, 0x17])?;
    image.write(&50001u16.to_be_bytes())?;
    image.write(&[169, 254, 144, 139])?;

    image.seek(0, Whence::Set)?;
    let flash_size = image.flash_size() as usize;
    let flash = image.read(flash_size)?;
    fs::write(out_path, &flash)?;
    info!("wrote {} flash bytes to {}", flash.len(), out_path);

    image.close()
}

fn main() -> ExitCode {
    let log_cfg = ConfigBuilder::new().build();
    let _ = TermLogger::init(
        LevelFilter::Debug,
        log_cfg,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let args: Vec<String> = env::args().collect();
    let (Some(image_path), Some(out_path)) = (args.get(1), args.get(2)) else {
        error!("usage: patch <image> <flash-out>");
        return ExitCode::FAILURE;
    };

    match patch(image_path, out_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
