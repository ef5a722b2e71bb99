use mzenvelope::isotopic_model::{mass_to_mz, AveragineTable, IsotopeModel, IsotopicModels};
use mzenvelope::Polarity;
use std::{env, error::Error};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let mass = args
        .next()
        .inspect(|s| eprintln!("mass: {s}"))
        .ok_or("Expected a floating point neutral mass")?
        .parse::<f64>()?;
    let charge = match args.next() {
        Some(s) => s.parse::<i32>()?,
        None => 1,
    };
    eprintln!("z: {charge}");
    if charge == 0 {
        return Err("The charge must not be zero".into());
    }

    let table = AveragineTable::with_max_mass(IsotopicModels::Peptide, mass + 1000.0);
    let cluster = table.nearest(mass)?;
    println!(
        "bin {}\tmonoisotopic {:.5}\toffset {:.5}",
        cluster.index,
        cluster.monoisotopic_mass(),
        cluster.monoisotopic_offset
    );
    let polarity = if charge < 0 {
        Polarity::Negative
    } else {
        Polarity::Positive
    };
    for (m, i) in cluster.iter() {
        println!(
            "{:.5}\t{:.3}\t{:.5}",
            m,
            mass_to_mz(m, charge, polarity),
            i * 100.0
        );
    }
    Ok(())
}
