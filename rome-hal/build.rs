use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use proc_macro2::TokenStream;
use quote::format_ident;
use quote::quote;

mod build_serde;
// Structures imported from build_serde.rs
use build_serde::NvmTable;

/// Must match `nvm::MAX_TAG_CMD`; one slot is taken by the end marker.
const MAX_TAG_CMD: usize = 30;
/// Largest tag value that still fits an NVM_SET command (255 - 3 header bytes).
const MAX_TAG_LEN: usize = 252;
/// Tag carrying the device address, patched at runtime.
const TAG_NUM_BD_ADDR: u8 = 2;
const BD_ADDR_LEN: usize = 6;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=build_serde.rs");
    println!("cargo:rerun-if-changed=data/nvm");

    let data_dir = Path::new("data").join("nvm");

    let mut paths: Vec<PathBuf> = fs::read_dir(&data_dir)
        .map_err(|e| format!("Failed to read {}: {}", data_dir.display(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    // Stable output regardless of directory iteration order.
    paths.sort();

    let mut token_stream = TokenStream::new();

    for path in &paths {
        println!("cargo:rerun-if-changed={}", path.display());

        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let table: NvmTable = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

        token_stream.extend(generate_nvm_table(&table)?);
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let dest_path = out_dir.join("nvm_tables_generated.rs");

    let mut file = fs::File::create(&dest_path)?;
    file.write_all(token_stream.to_string().as_bytes())?;
    drop(file);

    rustfmt(&dest_path);

    Ok(())
}

fn generate_nvm_table(table: &NvmTable) -> Result<TokenStream, String> {
    if table.tags.len() + 1 > MAX_TAG_CMD {
        return Err(format!(
            "NVM table {} has {} tags, at most {} allowed",
            table.revision,
            table.tags.len(),
            MAX_TAG_CMD - 1
        ));
    }

    let mut entries = TokenStream::new();
    for tag in &table.tags {
        if tag.tag == 0xFF {
            return Err(format!("NVM table {}: tag 0xFF is reserved", table.revision));
        }
        if tag.value.0.len() > MAX_TAG_LEN {
            return Err(format!(
                "NVM table {}: tag {} is {} bytes, at most {} allowed",
                table.revision,
                tag.tag,
                tag.value.0.len(),
                MAX_TAG_LEN
            ));
        }

        if tag.tag == TAG_NUM_BD_ADDR && tag.value.0.len() < BD_ADDR_LEN {
            return Err(format!(
                "NVM table {}: BD address tag is {} bytes, at least {} required",
                table.revision,
                tag.value.0.len(),
                BD_ADDR_LEN
            ));
        }

        let num = tag.tag;
        let bytes = &tag.value.0;
        entries.extend(quote! {
            NvmTag { tag: #num, value: &[#(#bytes),*] },
        });
    }

    let name = format_ident!("NVM_TABLE_{}", table.revision.to_ascii_uppercase());
    let doc = format!("NVM tag table `{}`.", table.revision);

    Ok(quote! {
        #[doc = #doc]
        pub static #name: &[NvmTag] = &[
            #entries
            NvmTag::END,
        ];
    })
}

/// rustfmt a given path.
/// Failures are logged to stderr and ignored.
fn rustfmt(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match Command::new("rustfmt").args([path]).output() {
        Err(e) => {
            eprintln!("failed to exec rustfmt {:?}: {:?}", path, e);
        }
        Ok(out) => {
            if !out.status.success() {
                eprintln!("rustfmt {:?} failed:", path);
                eprintln!("=== STDOUT:");
                let _ = std::io::stderr().write_all(&out.stdout);
                eprintln!("=== STDERR:");
                let _ = std::io::stderr().write_all(&out.stderr);
            }
        }
    }
}
