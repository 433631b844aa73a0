use crate::genome::Genome;

/// Caller-supplied fitness evaluation, invoked once per genome per
/// generation. The calculator may set node values and evaluate the genome's
/// network, but must not structurally modify it.
pub trait FitnessCalculator {
    fn calc_fitness(&mut self, genome: &mut Genome) -> f32;
}

impl<F> FitnessCalculator for F
where
    F: FnMut(&mut Genome) -> f32,
{
    fn calc_fitness(&mut self, genome: &mut Genome) -> f32 {
        self(genome)
    }
}

/// Feed `inputs` (and the bias value) into the genome and run one evaluation
/// sweep. Output values are then available through
/// [Genome::output_values](crate::genome::Genome::output_values).
pub fn evaluate_genome(genome: &mut Genome, inputs: &[f32], bias_value: f32) {
    genome.set_input_node_values(inputs, bias_value);
    genome.evaluate();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeConfig;
    use crate::innovation::InnovationCounter;
    use sprout_net::random::RandomSource;

    #[test]
    fn closures_are_fitness_calculators() {
        let cfg = GenomeConfig {
            num_input_nodes: 2,
            num_output_nodes: 1,
            ..GenomeConfig::default()
        };
        let mut counter = InnovationCounter::new();
        let mut random = RandomSource::from_seed(2);
        let mut genome = Genome::new(&cfg, &mut counter, &mut random).unwrap();

        let mut calc = |genome: &mut Genome| {
            evaluate_genome(genome, &[1.0, 2.0], 0.0);
            genome.output_values()[0]
        };

        let fitness = calc.calc_fitness(&mut genome);
        assert_eq!(fitness, 3.0);
    }
}
