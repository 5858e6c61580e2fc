use ethers::prelude::*;

// Types must match the Solidity contract exactly (uint128 liquidity,
// uint24 fee, int24 tick). Any deviation decodes silently wrong.
abigen!(
    IAmmPool,
    r#"[
        function liquidity() external view returns (uint128)
        function token0() external view returns (address)
        function token1() external view returns (address)
        function fee() external view returns (uint24)
        function tickSpacing() external view returns (int24)
    ]"#
);
