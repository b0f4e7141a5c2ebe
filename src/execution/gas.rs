use crate::chain::{ChainClient, FeeData, PreparedTransaction};
use alloy_primitives::{Address, Bytes, U256};
use eyre::{Result, WrapErr};

/// Fixed gas limit plus the network's EIP-1559 estimate scaled by a headroom percentage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GasPolicy {
    pub gas_limit: u64,
    pub headroom_percent: u64,
}

impl GasPolicy {
    pub fn new(gas_limit: u64, headroom_percent: u64) -> Self {
        Self { gas_limit, headroom_percent }
    }

    /// Scale both fee caps by `headroom_percent / 100`, flooring.
    pub fn apply_headroom(&self, fee_data: FeeData) -> FeeData {
        let scale = |fee: u128| fee.saturating_mul(self.headroom_percent as u128) / 100;
        let max_fee_per_gas = scale(fee_data.max_fee_per_gas);
        let max_priority_fee_per_gas = scale(fee_data.max_priority_fee_per_gas).min(max_fee_per_gas);
        FeeData { max_fee_per_gas, max_priority_fee_per_gas }
    }

    pub async fn prepare(&self, chain: &dyn ChainClient, to: Address, value: U256, input: Bytes) -> Result<PreparedTransaction> {
        let fee_data = chain.fee_data().await.wrap_err("fetch fee data")?;
        let fees = self.apply_headroom(fee_data);
        Ok(PreparedTransaction {
            to,
            value,
            input,
            gas_limit: self.gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChain;

    #[test]
    fn test_headroom_ten_percent() {
        let policy = GasPolicy::new(300_000, 110);
        let fees = policy.apply_headroom(FeeData { max_fee_per_gas: 1_000, max_priority_fee_per_gas: 15 });

        assert_eq!(fees.max_fee_per_gas, 1_100);
        // 16.5 floors to 16
        assert_eq!(fees.max_priority_fee_per_gas, 16);
    }

    #[test]
    fn test_priority_never_exceeds_max_fee() {
        let policy = GasPolicy::new(300_000, 110);
        let fees = policy.apply_headroom(FeeData { max_fee_per_gas: 10, max_priority_fee_per_gas: 50 });

        assert_eq!(fees.max_priority_fee_per_gas, fees.max_fee_per_gas);
    }

    #[tokio::test]
    async fn test_prepare_uses_fixed_limit() {
        let chain = MockChain::new().with_fee_data(FeeData { max_fee_per_gas: 2_000, max_priority_fee_per_gas: 100 });
        let policy = GasPolicy::new(210_000, 110);

        let tx = policy.prepare(&chain, Address::repeat_byte(1), U256::from(5u64), Bytes::new()).await.unwrap();

        assert_eq!(tx.gas_limit, 210_000);
        assert_eq!(tx.max_fee_per_gas, 2_200);
        assert_eq!(tx.max_priority_fee_per_gas, 110);
        assert_eq!(tx.value, U256::from(5u64));
    }
}
